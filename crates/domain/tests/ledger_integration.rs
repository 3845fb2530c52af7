//! Integration tests across the catalog, order ledger and wishlist.
//!
//! These tests verify cascading deletes, payment idempotence under replay
//! and concurrency, and partial-completion reporting.

use common::{DocumentId, Email};
use document_store::{Document, DocumentStoreExt, InMemoryDocumentStore};
use domain::{
    Book, Caller, Catalog, DomainError, Money, NewBook, Order, OrderError, OrderLedger,
    OrderStatus, PaymentOutcome, PlaceOrder, Role, Wishlist, WishlistEntry,
};

struct Fixture {
    store: InMemoryDocumentStore,
    catalog: Catalog<InMemoryDocumentStore>,
    ledger: OrderLedger<InMemoryDocumentStore>,
    wishlist: Wishlist<InMemoryDocumentStore>,
}

fn fixture() -> Fixture {
    let store = InMemoryDocumentStore::new();
    Fixture {
        catalog: Catalog::new(store.clone()),
        ledger: OrderLedger::new(store.clone()),
        wishlist: Wishlist::new(store.clone()),
        store,
    }
}

fn caller(email: &str, role: Role) -> Caller {
    Caller::new(Email::parse(email).unwrap(), email, role)
}

fn reader(n: u32) -> Caller {
    caller(&format!("reader{n}@example.com"), Role::User)
}

fn librarian() -> Caller {
    caller("lib@example.com", Role::Librarian)
}

fn admin() -> Caller {
    caller("admin@example.com", Role::Admin)
}

async fn add_book(f: &Fixture, title: &str, stock: i64) -> Book {
    f.catalog
        .create(
            &librarian(),
            NewBook::new(title, Money::from_cents(500)).with_stock(stock),
        )
        .await
        .unwrap()
}

async fn stock_of(f: &Fixture, id: DocumentId) -> i64 {
    f.store.get_document::<Book>(id).await.unwrap().unwrap().stock
}

mod cascade {
    use super::*;

    #[tokio::test]
    async fn deleting_a_book_removes_exactly_its_orders() {
        let f = fixture();
        let a = add_book(&f, "A", 10).await;
        let b = add_book(&f, "B", 10).await;
        let c = add_book(&f, "C", 10).await;

        let mut survivors = Vec::new();
        for (i, book) in [&a, &b, &c, &b, &a, &c, &b].iter().enumerate() {
            let order = f
                .ledger
                .place(&reader(i as u32), PlaceOrder::new(book.id))
                .await
                .unwrap();
            if book.id != b.id {
                survivors.push(order.id);
            }
        }
        f.wishlist.add(&reader(0), b.id).await.unwrap();
        f.wishlist.add(&reader(0), a.id).await.unwrap();

        let deleted = f.catalog.delete(&admin(), b.id).await.unwrap();
        assert_eq!(deleted.orders_removed, 3);
        assert_eq!(deleted.wishlist_entries_removed, 1);

        let remaining: Vec<DocumentId> = f
            .ledger
            .list_for(&admin())
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(remaining, survivors);
        assert_eq!(f.store.document_count(WishlistEntry::COLLECTION).await, 1);
        assert!(f.catalog.get(b.id).await.is_err());
    }

    #[tokio::test]
    async fn only_admins_delete_books() {
        let f = fixture();
        let book = add_book(&f, "A", 1).await;

        let denied = f.catalog.delete(&librarian(), book.id).await;
        assert!(matches!(denied, Err(DomainError::Forbidden(_))));

        let missing = f.catalog.delete(&admin(), DocumentId::new()).await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn failed_cascade_is_a_partial_completion() {
        let f = fixture();
        let book = add_book(&f, "A", 1).await;
        f.ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();
        f.store.set_fail_writes(Order::COLLECTION, true).await;

        let result = f.catalog.delete(&admin(), book.id).await;
        assert!(matches!(
            result,
            Err(DomainError::PartialCompletion { operation: "delete_book", .. })
        ));
        assert!(f.catalog.get(book.id).await.is_err());
    }
}

mod payment {
    use super::*;

    #[tokio::test]
    async fn paying_twice_decrements_stock_once() {
        let f = fixture();
        let book = add_book(&f, "X", 1).await;
        let order = f
            .ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();

        f.ledger.mark_paid(order.id, "pi_1").await.unwrap();
        f.ledger
            .update_status(&admin(), order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(stock_of(&f, book.id).await, 0);

        let replay = f.ledger.mark_paid(order.id, "pi_1").await.unwrap();
        assert!(matches!(replay, PaymentOutcome::AlreadyPaid(_)));
        f.ledger
            .update_status(&admin(), order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(stock_of(&f, book.id).await, 0);
    }

    #[tokio::test]
    async fn concurrent_confirmations_decrement_once() {
        let f = fixture();
        let book = add_book(&f, "X", 5).await;
        let order = f
            .ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = f.ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.mark_paid(order.id, "pi_1").await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if let Ok(PaymentOutcome::Applied(_)) = handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(stock_of(&f, book.id).await, 4);
    }

    #[tokio::test]
    async fn stock_never_goes_negative() {
        let f = fixture();
        let book = add_book(&f, "X", 1).await;
        let first = f
            .ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();
        let second = f
            .ledger
            .place(&reader(2), PlaceOrder::new(book.id))
            .await
            .unwrap();

        f.ledger.mark_paid(first.id, "pi_1").await.unwrap();
        let result = f.ledger.mark_paid(second.id, "pi_2").await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::OutOfStock { .. }))
        ));
        assert_eq!(stock_of(&f, book.id).await, 0);

        let late = f.ledger.place(&reader(3), PlaceOrder::new(book.id)).await;
        assert!(matches!(
            late,
            Err(DomainError::Order(OrderError::OutOfStock { .. }))
        ));
    }

    #[tokio::test]
    async fn charge_for_sold_out_book_leaves_order_unpaid() {
        let f = fixture();
        let book = add_book(&f, "X", 1).await;
        let first = f
            .ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();
        let second = f
            .ledger
            .place(&reader(2), PlaceOrder::new(book.id))
            .await
            .unwrap();

        f.ledger.mark_paid(first.id, "pi_1").await.unwrap();
        let result = f.ledger.mark_paid(second.id, "pi_2").await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::OutOfStock { .. }))
        ));

        let stored = f.ledger.get_for(&reader(2), second.id).await.unwrap();
        assert!(!stored.is_paid());
        assert_eq!(stored.payment_intent_id, None);
        assert_eq!(stock_of(&f, book.id).await, 0);
    }

    #[tokio::test]
    async fn intent_pays_for_one_order_only() {
        let f = fixture();
        let book = add_book(&f, "X", 5).await;
        let mut orders = Vec::new();
        for n in [1, 1, 2] {
            let order = f
                .ledger
                .place(&reader(n), PlaceOrder::new(book.id))
                .await
                .unwrap();
            orders.push(order);
        }

        let mut applied = 0;
        for order in &orders {
            match f.ledger.mark_paid(order.id, "pi_1").await {
                Ok(PaymentOutcome::Applied(_)) => applied += 1,
                Err(DomainError::Order(OrderError::IntentAlreadyUsed { .. })) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(stock_of(&f, book.id).await, 4);

        let replay = f.ledger.mark_paid(orders[0].id, "pi_1").await.unwrap();
        assert!(matches!(replay, PaymentOutcome::AlreadyPaid(_)));
        let unpaid = f.ledger.get_for(&reader(2), orders[2].id).await.unwrap();
        assert!(!unpaid.is_paid());
    }

    #[tokio::test]
    async fn failed_decrement_is_a_partial_completion() {
        let f = fixture();
        let book = add_book(&f, "X", 1).await;
        let order = f
            .ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();
        f.store.set_fail_writes(Book::COLLECTION, true).await;

        let result = f.ledger.mark_paid(order.id, "pi_1").await;
        assert!(matches!(
            result,
            Err(DomainError::PartialCompletion { operation: "mark_paid", .. })
        ));

        f.store.set_fail_writes(Book::COLLECTION, false).await;
        let replay = f.ledger.mark_paid(order.id, "pi_1").await.unwrap();
        assert!(matches!(replay, PaymentOutcome::AlreadyPaid(_)));
        assert_eq!(stock_of(&f, book.id).await, 1);
    }
}

mod access {
    use super::*;

    #[tokio::test]
    async fn readers_cannot_see_each_others_orders() {
        let f = fixture();
        let book = add_book(&f, "X", 2).await;
        let mine = f
            .ledger
            .place(&reader(1), PlaceOrder::new(book.id))
            .await
            .unwrap();

        assert_eq!(f.ledger.get_for(&reader(1), mine.id).await.unwrap().id, mine.id);
        assert!(matches!(
            f.ledger.get_for(&reader(2), mine.id).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            f.ledger.get_for(&reader(2), DocumentId::new()).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unpublished_books_cannot_be_ordered() {
        let f = fixture();
        let draft = f
            .catalog
            .create(
                &librarian(),
                NewBook::new("Draft", Money::zero())
                    .with_status(domain::BookStatus::Unpublished),
            )
            .await
            .unwrap();

        let result = f.ledger.place(&reader(1), PlaceOrder::new(draft.id)).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}

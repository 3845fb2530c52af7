//! Order ledger service providing placement, lookup and lifecycle updates.

use std::collections::HashMap;

use chrono::Utc;
use common::{DocumentId, Email};
use document_store::{DocumentStore, DocumentStoreError, DocumentStoreExt, Filter, Update};

use crate::access::Caller;
use crate::catalog::Book;
use crate::error::{DomainError, Result};
use crate::user::Role;

use super::model::PaymentClaim;
use super::{
    Order, OrderError, OrderStatus, OrderView, PaymentOutcome, PaymentStatus, PlaceOrder,
    Purchaser,
};

/// Service for managing orders.
///
/// Every write is a conditional update on the order's stored state, so two
/// requests racing on the same order cannot both apply.
#[derive(Clone)]
pub struct OrderLedger<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> OrderLedger<S> {
    /// Creates a new order ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for one unit of a published, in-stock book.
    #[tracing::instrument(skip(self, caller, cmd), fields(caller = %caller.email, book_id = %cmd.book_id))]
    pub async fn place(&self, caller: &Caller, cmd: PlaceOrder) -> Result<Order> {
        caller.require(Role::USER)?;

        let book: Book = self
            .store
            .get_document(cmd.book_id)
            .await?
            .filter(Book::is_published)
            .ok_or_else(|| DomainError::not_found("book", cmd.book_id))?;

        if book.stock < 1 {
            return Err(OrderError::OutOfStock {
                book_id: book.id.to_string(),
            }
            .into());
        }

        let name = cmd
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| caller.name.clone());

        let now = Utc::now();
        let order = Order {
            id: DocumentId::new(),
            book_id: book.id,
            book_title: book.title,
            librarian_email: book.added_by_email,
            purchaser: Purchaser {
                email: caller.email.clone(),
                name,
                phone: cmd.phone,
                address: cmd.address,
            },
            price: book.price,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };

        self.store.insert_document(&order).await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, "order placed");
        Ok(order)
    }

    /// Lists the orders the caller may see.
    ///
    /// Readers see their own orders, librarians the orders for books they
    /// own, admins everything.
    pub async fn list_for(&self, caller: &Caller) -> Result<Vec<Order>> {
        let filter = match caller.role {
            Role::User => Filter::new().eq("purchaser.email", caller.email.as_str()),
            Role::Librarian => Filter::new().eq("librarianEmail", caller.email.as_str()),
            Role::Admin => Filter::new(),
        };
        Ok(self.store.find_documents(&filter).await?)
    }

    /// Lists the orders placed by `email`. Only that user or an admin may ask.
    pub async fn list_for_email(&self, caller: &Caller, email: &Email) -> Result<Vec<Order>> {
        if caller.email != *email && !caller.is_admin() {
            return Err(DomainError::forbidden("cannot list another user's orders"));
        }
        let filter = Filter::new().eq("purchaser.email", email.as_str());
        Ok(self.store.find_documents(&filter).await?)
    }

    /// Loads an order the caller is allowed to see.
    ///
    /// The purchaser, the librarian who owns the book and admins may read it.
    pub async fn get_for(&self, caller: &Caller, id: DocumentId) -> Result<Order> {
        let order = self.get(id).await?;
        let allowed = order.is_placed_by(&caller.email)
            || caller.is_admin()
            || (caller.role == Role::Librarian && order.librarian_email == caller.email);
        if !allowed {
            return Err(DomainError::forbidden("order belongs to another user"));
        }
        Ok(order)
    }

    async fn get(&self, id: DocumentId) -> Result<Order> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))
    }

    /// Checks that `caller` may move `order` to `status` without writing.
    ///
    /// The owning librarian and admins may set any status; the purchaser may
    /// only cancel. Terminal orders stay where they are, and re-applying the
    /// current status is always allowed.
    pub fn check_status_change(
        &self,
        caller: &Caller,
        order: &Order,
        status: OrderStatus,
    ) -> Result<()> {
        let manages = caller.is_admin()
            || (caller.role == Role::Librarian && order.librarian_email == caller.email);
        let cancels_own = order.is_placed_by(&caller.email) && status == OrderStatus::Cancelled;
        if !manages && !cancels_own {
            return Err(DomainError::forbidden(
                "only the book's librarian or an admin may change this order",
            ));
        }

        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: status,
            }
            .into());
        }
        Ok(())
    }

    /// Moves an order to a new lifecycle status.
    ///
    /// Permissions and transitions follow [`Self::check_status_change`].
    /// Re-applying the current status changes nothing.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn update_status(
        &self,
        caller: &Caller,
        id: DocumentId,
        status: OrderStatus,
    ) -> Result<Order> {
        let order = self.get(id).await?;
        self.check_status_change(caller, &order, status)?;
        if order.status == status {
            return Ok(order);
        }

        let updated = self
            .store
            .update_document(
                id,
                &Filter::new().eq("status", order.status.as_str()),
                &Update::new()
                    .set("status", status.as_str())
                    .set("updatedAt", serde_json::to_value(Utc::now())?),
            )
            .await?
            .ok_or_else(|| OrderError::ConcurrentModification {
                order_id: id.to_string(),
            })?;

        tracing::info!(order_id = %id, from = %order.status, to = %status, "order status changed");
        Ok(updated)
    }

    /// Records a confirmed payment and takes one unit of stock.
    ///
    /// Only the payment bridge calls this, after the processor has confirmed
    /// the charge. Each intent pays for one order: the first order to claim
    /// it keeps it. The unpaid-to-paid switch is a compare-and-swap on the
    /// stored payment status, so replays and concurrent confirmations apply
    /// at most once. If the order flips to paid but the stock decrement then
    /// fails, the order stays paid and the failure is reported as a partial
    /// completion.
    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: DocumentId, intent_id: &str) -> Result<PaymentOutcome> {
        let order = self.get(order_id).await?;
        if order.is_paid() {
            return Ok(PaymentOutcome::AlreadyPaid(order));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(orphaned(
                intent_id,
                OrderError::Cancelled {
                    order_id: order_id.to_string(),
                },
            ));
        }

        let book: Book = self
            .store
            .get_document(order.book_id)
            .await?
            .ok_or_else(|| DomainError::not_found("book", order.book_id))?;
        if book.stock < 1 {
            return Err(orphaned(
                intent_id,
                OrderError::OutOfStock {
                    book_id: book.id.to_string(),
                },
            ));
        }

        self.claim_intent(order_id, intent_id).await?;

        let now = serde_json::to_value(Utc::now())?;
        let swapped: Option<Order> = self
            .store
            .update_document(
                order_id,
                &Filter::new()
                    .eq("paymentStatus", PaymentStatus::Unpaid.as_str())
                    .eq("status", order.status.as_str()),
                &Update::new()
                    .set("paymentStatus", PaymentStatus::Paid.as_str())
                    .set("paymentIntentId", intent_id)
                    .set("paidAt", now.clone())
                    .set("updatedAt", now),
            )
            .await?;

        let Some(paid) = swapped else {
            // Lost the race; report what the winner left behind
            let current = self.get(order_id).await?;
            if current.is_paid() {
                return Ok(PaymentOutcome::AlreadyPaid(current));
            }
            if current.status == OrderStatus::Cancelled {
                return Err(orphaned(
                    intent_id,
                    OrderError::Cancelled {
                        order_id: order_id.to_string(),
                    },
                ));
            }
            return Err(OrderError::ConcurrentModification {
                order_id: order_id.to_string(),
            }
            .into());
        };

        metrics::counter!("orders_paid_total").increment(1);

        let decrement = self
            .store
            .update_document::<Book>(
                paid.book_id,
                &Filter::new().gte("stock", 1),
                &Update::new().inc("stock", -1),
            )
            .await;

        let reason = match decrement {
            Ok(Some(book)) => {
                metrics::counter!("stock_decrements_total").increment(1);
                tracing::info!(order_id = %order_id, book_id = %book.id, stock = book.stock, "order paid");
                return Ok(PaymentOutcome::Applied(paid));
            }
            Ok(None) => "book sold out or removed before stock could be taken".to_string(),
            Err(e) => e.to_string(),
        };

        metrics::counter!("partial_completions_total").increment(1);
        tracing::error!(order_id = %order_id, book_id = %paid.book_id, %reason, "order paid but stock not decremented");
        Err(DomainError::PartialCompletion {
            operation: "mark_paid",
            id: order_id.to_string(),
            reason,
        })
    }

    /// Binds `intent_id` to `order_id`, or fails if another order holds it.
    async fn claim_intent(&self, order_id: DocumentId, intent_id: &str) -> Result<()> {
        let claim = PaymentClaim {
            id: PaymentClaim::id_for(intent_id),
            intent_id: intent_id.to_string(),
            order_id,
            claimed_at: Utc::now(),
        };

        let holder = match self.store.insert_document(&claim).await {
            Ok(()) => return Ok(()),
            Err(DocumentStoreError::DuplicateKey { .. }) => self
                .store
                .get_document::<PaymentClaim>(claim.id)
                .await?
                .map(|existing| existing.order_id),
            Err(e) => return Err(e.into()),
        };

        if holder == Some(order_id) {
            return Ok(());
        }
        tracing::warn!(order_id = %order_id, intent_id, "payment intent already spent on another order");
        Err(OrderError::IntentAlreadyUsed {
            intent_id: intent_id.to_string(),
        }
        .into())
    }

    /// Resolves one order's book.
    pub async fn view(&self, order: Order) -> Result<OrderView> {
        let book = self.store.get_document(order.book_id).await?;
        Ok(OrderView { order, book })
    }

    /// Resolves each order's book. Books are loaded once per distinct id.
    pub async fn populate(&self, orders: Vec<Order>) -> Result<Vec<OrderView>> {
        let mut books: HashMap<DocumentId, Option<Book>> = HashMap::new();
        let mut views = Vec::with_capacity(orders.len());

        for order in orders {
            let book = match books.get(&order.book_id) {
                Some(book) => book.clone(),
                None => {
                    let book: Option<Book> = self.store.get_document(order.book_id).await?;
                    books.insert(order.book_id, book.clone());
                    book
                }
            };
            views.push(OrderView { order, book });
        }

        Ok(views)
    }
}

/// Reports an order that cannot take a payment the processor already charged.
fn orphaned(intent_id: &str, err: OrderError) -> DomainError {
    metrics::counter!("payment_orphaned_total").increment(1);
    tracing::error!(intent_id, error = %err, "payment confirmed but order cannot take it");
    err.into()
}

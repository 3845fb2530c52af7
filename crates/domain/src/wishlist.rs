//! Per-user wishlist of books.

use chrono::{DateTime, Utc};
use common::{DocumentId, Email};
use document_store::{Document, DocumentStore, DocumentStoreError, DocumentStoreExt, Filter};
use serde::{Deserialize, Serialize};

use crate::access::Caller;
use crate::catalog::Book;
use crate::error::{DomainError, Result};

/// One book saved by one user. Unique per (email, book).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: DocumentId,
    pub email: Email,
    pub book_id: DocumentId,
    pub created_at: DateTime<Utc>,
}

impl WishlistEntry {
    /// The document key for `email`'s entry for `book_id`.
    pub fn id_for(email: &Email, book_id: DocumentId) -> DocumentId {
        DocumentId::from_key(&format!("{email}:{book_id}"))
    }
}

impl Document for WishlistEntry {
    const COLLECTION: &'static str = "wishlist";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// A wishlist entry with its book resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WishlistItem {
    #[serde(flatten)]
    pub entry: WishlistEntry,
    pub book: Option<Book>,
}

/// Service for wishlists. Every operation acts on the caller's own list.
#[derive(Clone)]
pub struct Wishlist<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> Wishlist<S> {
    /// Creates a new wishlist service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Saves a book. Saving the same book twice returns the first entry.
    ///
    /// The boolean is true when a new entry was created.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn add(&self, caller: &Caller, book_id: DocumentId) -> Result<(WishlistEntry, bool)> {
        if self.store.get_document::<Book>(book_id).await?.is_none() {
            return Err(DomainError::not_found("book", book_id));
        }

        let entry = WishlistEntry {
            id: WishlistEntry::id_for(&caller.email, book_id),
            email: caller.email.clone(),
            book_id,
            created_at: Utc::now(),
        };

        match self.store.insert_document(&entry).await {
            Ok(()) => Ok((entry, true)),
            Err(DocumentStoreError::DuplicateKey { .. }) => {
                let existing = self
                    .store
                    .get_document(entry.id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("wishlist entry", entry.id))?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the caller's saved books, oldest first.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<WishlistItem>> {
        let entries: Vec<WishlistEntry> = self
            .store
            .find_documents(&Filter::new().eq("email", caller.email.as_str()))
            .await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let book = self.store.get_document(entry.book_id).await?;
            items.push(WishlistItem { entry, book });
        }
        Ok(items)
    }

    /// Removes a saved book.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn remove(&self, caller: &Caller, book_id: DocumentId) -> Result<()> {
        let id = WishlistEntry::id_for(&caller.email, book_id);
        if !self.store.delete_document::<WishlistEntry>(id).await? {
            return Err(DomainError::not_found("wishlist entry", book_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use document_store::InMemoryDocumentStore;

    use super::*;
    use crate::catalog::{Catalog, NewBook};
    use crate::user::Role;
    use crate::value_objects::Money;

    fn caller(email: &str) -> Caller {
        Caller::new(Email::parse(email).unwrap(), "Reader", Role::User)
    }

    async fn setup() -> (Wishlist<InMemoryDocumentStore>, Book) {
        let store = InMemoryDocumentStore::new();
        let librarian = Caller::new(Email::parse("lib@example.com").unwrap(), "Lib", Role::Librarian);
        let book = Catalog::new(store.clone())
            .create(&librarian, NewBook::new("Dune", Money::from_cents(999)))
            .await
            .unwrap();
        (Wishlist::new(store), book)
    }

    #[tokio::test]
    async fn test_add_is_idempotent_per_user_and_book() {
        let (wishlist, book) = setup().await;
        let reader = caller("reader@example.com");

        let (first, created) = wishlist.add(&reader, book.id).await.unwrap();
        assert!(created);
        let (second, created) = wishlist.add(&reader, book.id).await.unwrap();
        assert!(!created);
        assert_eq!(first, second);

        let (_, created) = wishlist
            .add(&caller("other@example.com"), book.id)
            .await
            .unwrap();
        assert!(created);

        assert_eq!(wishlist.list(&reader).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_unknown_book_is_not_found() {
        let (wishlist, _) = setup().await;
        let result = wishlist.add(&caller("reader@example.com"), DocumentId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_populates_books_and_remove() {
        let (wishlist, book) = setup().await;
        let reader = caller("reader@example.com");
        wishlist.add(&reader, book.id).await.unwrap();

        let items = wishlist.list(&reader).await.unwrap();
        assert_eq!(items[0].book.as_ref().map(|b| b.title.as_str()), Some("Dune"));

        wishlist.remove(&reader, book.id).await.unwrap();
        assert!(wishlist.list(&reader).await.unwrap().is_empty());
        assert!(matches!(
            wishlist.remove(&reader, book.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}

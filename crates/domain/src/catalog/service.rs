//! Catalog service providing book management and reviews.

use chrono::Utc;
use common::DocumentId;
use document_store::{DocumentStore, DocumentStoreExt, Filter, Update};
use serde::Serialize;

use crate::access::Caller;
use crate::error::{DomainError, Result};
use crate::order::Order;
use crate::user::Role;
use crate::wishlist::WishlistEntry;

use super::{Book, BookPatch, BookStatus, NewBook, Review, ReviewInput};

/// Stock given to a new book when none is specified.
const DEFAULT_STOCK: i64 = 1;

/// Summary of a book deletion and its cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBook {
    pub id: DocumentId,
    pub orders_removed: u64,
    pub wishlist_entries_removed: u64,
}

/// Service for the book catalog.
#[derive(Clone)]
pub struct Catalog<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> Catalog<S> {
    /// Creates a new catalog over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a book owned by the caller. Librarians and admins only.
    #[tracing::instrument(skip(self, caller, new_book), fields(caller = %caller.email))]
    pub async fn create(&self, caller: &Caller, new_book: NewBook) -> Result<Book> {
        caller.require(Role::LIBRARIAN)?;

        let title = validate_title(&new_book.title)?;
        if new_book.price.is_negative() {
            return Err(DomainError::validation("price", "must be zero or greater"));
        }
        let stock = new_book.stock.unwrap_or(DEFAULT_STOCK);
        validate_stock(stock)?;

        let now = Utc::now();
        let book = Book {
            id: DocumentId::new(),
            title,
            author: new_book.author,
            description: new_book.description,
            image: new_book.image,
            price: new_book.price,
            category: new_book.category,
            stock,
            status: new_book.status.unwrap_or_default(),
            added_by_email: caller.email.clone(),
            reviews: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_document(&book).await?;
        tracing::info!(book_id = %book.id, "book created");
        Ok(book)
    }

    /// Loads a book regardless of status.
    pub async fn get(&self, id: DocumentId) -> Result<Book> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| DomainError::not_found("book", id))
    }

    /// Loads a book if it is published or the caller manages it.
    ///
    /// Unpublished books are reported as missing to everyone else.
    pub async fn get_visible(&self, caller: Option<&Caller>, id: DocumentId) -> Result<Book> {
        let book = self.get(id).await?;
        let visible = book.is_published()
            || caller.is_some_and(|c| c.is_admin() || book.is_owned_by(&c.email));
        if visible {
            Ok(book)
        } else {
            Err(DomainError::not_found("book", id))
        }
    }

    /// Lists published books, optionally restricted to one category.
    pub async fn list_published(&self, category: Option<&str>) -> Result<Vec<Book>> {
        let mut filter = Filter::new().eq("status", BookStatus::Published.as_str());
        if let Some(category) = category {
            filter = filter.eq("category", category);
        }
        Ok(self.store.find_documents(&filter).await?)
    }

    /// Lists the books the caller added, in any status.
    pub async fn list_owned(&self, caller: &Caller) -> Result<Vec<Book>> {
        caller.require(Role::LIBRARIAN)?;
        let filter = Filter::new().eq("addedByEmail", caller.email.as_str());
        Ok(self.store.find_documents(&filter).await?)
    }

    /// Lists every book in any status. Admin only.
    pub async fn list_all(&self, caller: &Caller) -> Result<Vec<Book>> {
        caller.require(Role::ADMIN)?;
        Ok(self.store.find_documents(&Filter::new()).await?)
    }

    /// Merges the given fields into a book. Owner or admin only.
    #[tracing::instrument(skip(self, caller, patch), fields(caller = %caller.email))]
    pub async fn update(&self, caller: &Caller, id: DocumentId, patch: BookPatch) -> Result<Book> {
        caller.require(Role::LIBRARIAN)?;

        let book = self.get(id).await?;
        if !caller.is_admin() && !book.is_owned_by(&caller.email) {
            return Err(DomainError::forbidden("only the owner or an admin may edit this book"));
        }

        let mut update = Update::new();
        if let Some(title) = patch.title {
            update = update.set("title", validate_title(&title)?);
        }
        if let Some(author) = patch.author {
            update = update.set("author", author);
        }
        if let Some(description) = patch.description {
            update = update.set("description", description);
        }
        if let Some(image) = patch.image {
            update = update.set("image", image);
        }
        if let Some(price) = patch.price {
            if price.is_negative() {
                return Err(DomainError::validation("price", "must be zero or greater"));
            }
            update = update.set("price", serde_json::to_value(price)?);
        }
        if let Some(category) = patch.category {
            update = update.set("category", category);
        }
        if let Some(stock) = patch.stock {
            validate_stock(stock)?;
            update = update.set("stock", stock);
        }
        if let Some(status) = patch.status {
            update = update.set("status", status.as_str());
        }
        update = update.set("updatedAt", serde_json::to_value(Utc::now())?);

        let updated = self
            .store
            .update_document(id, &Filter::new(), &update)
            .await?
            .ok_or_else(|| DomainError::not_found("book", id))?;

        tracing::info!(book_id = %id, "book updated");
        Ok(updated)
    }

    /// Deletes a book and every order and wishlist entry referencing it. Admin only.
    ///
    /// The book is removed first. If a cascade step then fails the book is
    /// already gone, which is reported as a partial completion.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn delete(&self, caller: &Caller, id: DocumentId) -> Result<DeletedBook> {
        caller.require(Role::ADMIN)?;

        if !self.store.delete_document::<Book>(id).await? {
            return Err(DomainError::not_found("book", id));
        }

        let by_book = Filter::new().eq("bookId", id.to_string());
        let cascade = async {
            let orders_removed = self.store.delete_documents::<Order>(&by_book).await?;
            let wishlist_entries_removed =
                self.store.delete_documents::<WishlistEntry>(&by_book).await?;
            Ok::<_, document_store::DocumentStoreError>((orders_removed, wishlist_entries_removed))
        };

        let (orders_removed, wishlist_entries_removed) = cascade.await.map_err(|e| {
            metrics::counter!("partial_completions_total").increment(1);
            tracing::error!(book_id = %id, error = %e, "book deleted but cascade failed");
            DomainError::PartialCompletion {
                operation: "delete_book",
                id: id.to_string(),
                reason: e.to_string(),
            }
        })?;

        metrics::counter!("books_deleted_total").increment(1);
        tracing::info!(book_id = %id, orders_removed, wishlist_entries_removed, "book deleted");

        Ok(DeletedBook {
            id,
            orders_removed,
            wishlist_entries_removed,
        })
    }

    /// Appends a review to a book. Readers only.
    ///
    /// No aggregate rating is stored; readers compute it from the list.
    #[tracing::instrument(skip(self, caller, input), fields(caller = %caller.email))]
    pub async fn add_review(
        &self,
        caller: &Caller,
        id: DocumentId,
        input: ReviewInput,
    ) -> Result<Book> {
        caller.require(Role::USER)?;

        if !(1..=5).contains(&input.rating) {
            return Err(DomainError::validation("rating", "must be between 1 and 5"));
        }

        let review = Review {
            reviewer_email: caller.email.clone(),
            reviewer_name: caller.name.clone(),
            rating: input.rating,
            comment: input
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };

        self.store
            .update_document(
                id,
                &Filter::new(),
                &Update::new().push("reviews", serde_json::to_value(&review)?),
            )
            .await?
            .ok_or_else(|| DomainError::not_found("book", id))
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    Ok(title.to_string())
}

fn validate_stock(stock: i64) -> Result<()> {
    if stock < 0 {
        return Err(DomainError::validation("stock", "must be zero or greater"));
    }
    Ok(())
}

//! Book catalog: records, reviews and the catalog service.

mod service;

pub use service::{Catalog, DeletedBook};

use chrono::{DateTime, Utc};
use common::{DocumentId, Email};
use document_store::Document;
use serde::{Deserialize, Serialize};

use crate::value_objects::Money;

/// Whether a book is visible in the public catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Published,
    Unpublished,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Published => "published",
            BookStatus::Unpublished => "unpublished",
        }
    }
}

/// A reader's rating of a book, embedded in the book document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub reviewer_email: Email,
    pub reviewer_name: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub category: Option<String>,
    /// Units available. Never negative.
    pub stock: i64,
    pub status: BookStatus,
    /// The librarian who added the book. Immutable.
    pub added_by_email: Email,
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Returns true if `email` owns this book.
    pub fn is_owned_by(&self, email: &Email) -> bool {
        self.added_by_email == *email
    }

    pub fn is_published(&self) -> bool {
        self.status == BookStatus::Published
    }
}

impl Document for Book {
    const COLLECTION: &'static str = "books";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// Fields for a new book. The owner always comes from the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBook {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub status: Option<BookStatus>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, price: Money) -> Self {
        Self {
            title: title.into(),
            author: None,
            description: None,
            image: None,
            price,
            category: None,
            stock: None,
            status: None,
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_status(mut self, status: BookStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A partial update. Absent fields are left unchanged.
///
/// Unknown fields, including the owner and the review list, are rejected
/// when deserializing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Option<Money>,
    pub category: Option<String>,
    pub stock: Option<i64>,
    pub status: Option<BookStatus>,
}

/// A review as submitted by a reader.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviewInput {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

use chrono::{DateTime, Utc};
use common::{DocumentId, Email};
use document_store::Document;
use serde::{Deserialize, Serialize};

use crate::catalog::Book;
use crate::value_objects::Money;

use super::{OrderStatus, PaymentStatus};

/// Who placed an order and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchaser {
    pub email: Email,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// An order for a single book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: DocumentId,
    pub book_id: DocumentId,
    /// Title at the time the order was placed.
    pub book_title: String,
    /// Owner of the book, copied so librarians can list their orders.
    pub librarian_email: Email,
    pub purchaser: Purchaser,
    /// Unit price snapshot.
    pub price: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_placed_by(&self, email: &Email) -> bool {
        self.purchaser.email == *email
    }
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// Records which order a payment intent was spent on.
///
/// Keyed by the intent id, so the store's primary key lets each intent pay
/// for one order only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentClaim {
    pub id: DocumentId,
    pub intent_id: String,
    pub order_id: DocumentId,
    pub claimed_at: DateTime<Utc>,
}

impl PaymentClaim {
    pub fn id_for(intent_id: &str) -> DocumentId {
        DocumentId::from_key(&format!("payment-intent:{intent_id}"))
    }
}

impl Document for PaymentClaim {
    const COLLECTION: &'static str = "payment_claims";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// An order with its book resolved at read time.
///
/// `book` is None when the book no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub book: Option<Book>,
}

/// Result of applying a confirmed payment to an order.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The order moved from unpaid to paid and stock was decremented.
    Applied(Order),

    /// The order was already paid; nothing changed.
    AlreadyPaid(Order),
}

impl PaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            PaymentOutcome::Applied(order) | PaymentOutcome::AlreadyPaid(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            PaymentOutcome::Applied(order) | PaymentOutcome::AlreadyPaid(order) => order,
        }
    }
}

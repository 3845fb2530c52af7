//! Order requests as submitted by callers.

use common::DocumentId;
use serde::Deserialize;

use crate::error::{DomainError, Result};

use super::{OrderStatus, PaymentStatus};

/// Request to place an order for one book.
///
/// The purchaser's email always comes from the verified caller; any email
/// in the request body is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    /// The book being ordered.
    pub book_id: DocumentId,

    /// Display name for the delivery. Defaults to the caller's name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<String>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder request.
    pub fn new(book_id: DocumentId) -> Self {
        Self {
            book_id,
            name: None,
            phone: None,
            address: None,
        }
    }

    /// Sets the delivery details.
    pub fn with_delivery(mut self, phone: impl Into<String>, address: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self.address = Some(address.into());
        self
    }
}

/// Request to change an order's status and/or payment status.
///
/// `paymentStatus` may only be set to `paid`, and only together with the
/// payment intent that proves it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusChange {
    #[serde(default)]
    pub status: Option<OrderStatus>,

    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,

    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

impl StatusChange {
    /// Checks the request is internally consistent.
    ///
    /// Returns the payment intent id when the request asks to mark the
    /// order paid.
    pub fn validate(&self) -> Result<Option<&str>> {
        if self.status.is_none() && self.payment_status.is_none() {
            return Err(DomainError::validation(
                "status",
                "at least one of status or paymentStatus is required",
            ));
        }

        match self.payment_status {
            None => Ok(None),
            Some(PaymentStatus::Unpaid) => Err(DomainError::validation(
                "paymentStatus",
                "only 'paid' may be requested",
            )),
            Some(PaymentStatus::Paid) => self
                .payment_intent_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(Some)
                .ok_or_else(|| {
                    DomainError::validation(
                        "paymentIntentId",
                        "required when setting paymentStatus to 'paid'",
                    )
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(json: serde_json::Value) -> StatusChange {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_status_only_is_valid() {
        let c = change(serde_json::json!({"status": "shipped"}));
        assert_eq!(c.validate().unwrap(), None);
    }

    #[test]
    fn test_paid_requires_intent() {
        let c = change(serde_json::json!({"paymentStatus": "paid", "status": "completed"}));
        assert!(matches!(
            c.validate(),
            Err(DomainError::Validation { field: "paymentIntentId", .. })
        ));

        let c = change(serde_json::json!({"paymentStatus": "paid", "paymentIntentId": "pi_0001"}));
        assert_eq!(c.validate().unwrap(), Some("pi_0001"));
    }

    #[test]
    fn test_unpaid_and_empty_requests_are_rejected() {
        assert!(change(serde_json::json!({"paymentStatus": "unpaid"})).validate().is_err());
        assert!(change(serde_json::json!({})).validate().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: std::result::Result<StatusChange, _> =
            serde_json::from_value(serde_json::json!({"status": "shipped", "bookId": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_place_order_ignores_supplied_email() {
        let id = DocumentId::new();
        let cmd: PlaceOrder = serde_json::from_value(serde_json::json!({
            "bookId": id.to_string(),
            "email": "someone-else@example.com",
            "address": "1 Main St"
        }))
        .unwrap();
        assert_eq!(cmd.book_id, id);
        assert_eq!(cmd.address.as_deref(), Some("1 Main St"));
    }
}

//! Payment error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while creating or confirming payments.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The requested amount is missing, zero or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The payment processor rejected the call or could not be reached.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// The payment intent does not prove payment for the order.
    #[error("Payment not confirmed: {0}")]
    NotConfirmed(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;

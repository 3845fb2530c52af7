//! Domain error types.

use document_store::DocumentStoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A field is missing or malformed.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// No credential, or the identity provider rejected it.
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// The caller is known but may not perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The identifier does not resolve to a stored entity.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An error occurred in the order ledger.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A multi-step write stopped after its first step was committed.
    #[error("Partial completion of {operation} for {id}: {reason}")]
    PartialCompletion {
        operation: &'static str,
        id: String,
        reason: String,
    },

    /// The identity provider could not be reached.
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DomainError::Forbidden(message.into())
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

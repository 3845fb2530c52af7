//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};
use payments::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Payment bridge error.
    Payment(PaymentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation", msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
        };

        metrics::counter!("api_errors_total", "kind" => kind).increment(1);
        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    match &err {
        DomainError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation", err.to_string()),
        DomainError::Unauthenticated(_) => {
            (StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string())
        }
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", err.to_string()),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidTransition { .. }
            | OrderError::OutOfStock { .. }
            | OrderError::Cancelled { .. }
            | OrderError::ConcurrentModification { .. }
            | OrderError::IntentAlreadyUsed { .. } => {
                (StatusCode::CONFLICT, "conflict", err.to_string())
            }
        },
        DomainError::PartialCompletion { operation, id, .. } => {
            tracing::error!(error = %err, "partial completion");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "partial_completion",
                format!("{operation} for {id} was only partially applied"),
            )
        }
        DomainError::IdentityProvider(_) => {
            tracing::error!(error = %err, "identity provider error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dependency",
                "identity provider unavailable".to_string(),
            )
        }
        DomainError::Store(_) | DomainError::Serialization(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dependency",
                "internal server error".to_string(),
            )
        }
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, &'static str, String) {
    match err {
        PaymentError::Domain(err) => domain_error_to_response(err),
        PaymentError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "validation", err.to_string()),
        PaymentError::NotConfirmed(_) => {
            (StatusCode::FORBIDDEN, "payment_not_confirmed", err.to_string())
        }
        PaymentError::Provider(_) => {
            tracing::error!(error = %err, "payment provider error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment_provider",
                "payment provider error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

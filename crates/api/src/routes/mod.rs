//! Route handlers and the state they share.

pub mod books;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod users;
pub mod wishlist;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use common::DocumentId;
use document_store::DocumentStore;
use domain::{AccessControl, Caller, Catalog, Directory, OrderLedger, Role, Wishlist};
use ::payments::PaymentBridge;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub access: AccessControl<S>,
    pub directory: Directory<S>,
    pub catalog: Catalog<S>,
    pub ledger: OrderLedger<S>,
    pub wishlist: Wishlist<S>,
    pub payments: PaymentBridge<S>,
}

impl<S: DocumentStore> AppState<S> {
    /// Authenticates the request's bearer credential and checks its role.
    pub async fn authorize(&self, headers: &HeaderMap, required: &[Role]) -> Result<Caller, ApiError> {
        Ok(self.access.authorize(bearer(headers), required).await?)
    }

    /// Authenticates the caller if the request carries a credential.
    pub async fn optional_caller(&self, headers: &HeaderMap) -> Result<Option<Caller>, ApiError> {
        match bearer(headers) {
            Some(credential) => Ok(Some(self.access.authenticate(Some(credential)).await?)),
            None => Ok(None),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn parse_id(id: &str) -> Result<DocumentId, ApiError> {
    DocumentId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

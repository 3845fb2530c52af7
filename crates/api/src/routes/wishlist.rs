//! Wishlist endpoints. Each caller only ever sees their own list.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::DocumentId;
use document_store::DocumentStore;
use domain::{Role, WishlistEntry, WishlistItem};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub book_id: DocumentId,
}

/// GET /api/wishlist
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<WishlistItem>>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    Ok(Json(state.wishlist.list(&caller).await?))
}

/// POST /api/wishlist
#[tracing::instrument(skip(state, headers, payload))]
pub async fn add<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WishlistEntry>), ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let Json(req) = payload?;
    let (entry, created) = state.wishlist.add(&caller, req.book_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(entry)))
}

/// DELETE /api/wishlist/:book_id
#[tracing::instrument(skip(state, headers))]
pub async fn remove<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let book_id = parse_id(&book_id)?;
    state.wishlist.remove(&caller, book_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

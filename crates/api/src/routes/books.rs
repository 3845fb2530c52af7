//! Catalog and review endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use document_store::DocumentStore;
use domain::{Book, BookPatch, DeletedBook, NewBook, ReviewInput, Role};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListBooksQuery {
    pub category: Option<String>,
}

/// GET /api/books: published books, optionally by category.
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<ListBooksQuery>, QueryRejection>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let Query(query) = query?;
    let books = state
        .catalog
        .list_published(query.category.as_deref().filter(|c| !c.is_empty()))
        .await?;
    Ok(Json(books))
}

/// GET /api/books/:id: a published book, or an unpublished one for its owner or an admin.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let id = parse_id(&id)?;
    let caller = state.optional_caller(&headers).await?;
    let book = state.catalog.get_visible(caller.as_ref(), id).await?;
    Ok(Json(book))
}

/// POST /api/books: add a book owned by the calling librarian.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let caller = state.authorize(&headers, Role::LIBRARIAN).await?;
    let Json(new_book) = payload?;
    let book = state.catalog.create(&caller, new_book).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// PATCH /api/books/:id: merge fields into a book.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let caller = state.authorize(&headers, Role::LIBRARIAN).await?;
    let id = parse_id(&id)?;
    let Json(patch) = payload?;
    let book = state.catalog.update(&caller, id, patch).await?;
    Ok(Json(book))
}

/// DELETE /api/books/:id: remove a book with its orders and wishlist entries.
#[tracing::instrument(skip(state, headers))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DeletedBook>, ApiError> {
    let caller = state.authorize(&headers, Role::ADMIN).await?;
    let id = parse_id(&id)?;
    let deleted = state.catalog.delete(&caller, id).await?;
    Ok(Json(deleted))
}

/// POST /api/books/:id/reviews: append a review.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn add_review<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let caller = state.authorize(&headers, Role::USER).await?;
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let book = state.catalog.add_review(&caller, id, input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /api/librarian/books: books the caller added, in any status.
#[tracing::instrument(skip(state, headers))]
pub async fn list_owned<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Book>>, ApiError> {
    let caller = state.authorize(&headers, Role::LIBRARIAN).await?;
    Ok(Json(state.catalog.list_owned(&caller).await?))
}

/// GET /api/admin/books: every book.
#[tracing::instrument(skip(state, headers))]
pub async fn list_all<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Book>>, ApiError> {
    let caller = state.authorize(&headers, Role::ADMIN).await?;
    Ok(Json(state.catalog.list_all(&caller).await?))
}

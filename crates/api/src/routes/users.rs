//! Identity directory endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use document_store::DocumentStore;
use domain::{Registration, Role, User};
use serde::Deserialize;

use super::{AppState, bearer, parse_id};
use crate::error::ApiError;

/// Profile fields sent on first sign-in. The email always comes from the credential.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub auth_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// POST /api/users: create the caller's record on first contact.
///
/// Returns 201 when the record is new and 200 with the existing record otherwise.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn register<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = state.access.identify(bearer(&headers)).await?;
    let Json(req) = payload?;

    let mut registration = Registration::new(email, req.name.unwrap_or_default());
    registration.photo_url = req.photo_url;
    if let Some(provider) = req.auth_provider {
        registration = registration.with_provider(provider);
    }

    let (user, created) = state.directory.register(registration).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(user)))
}

/// GET /api/users/me: the caller's own record.
#[tracing::instrument(skip(state, headers))]
pub async fn me<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let user = state.directory.get(User::id_for(&caller.email)).await?;
    Ok(Json(user))
}

/// GET /api/users: every user. Admin only.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
    let caller = state.authorize(&headers, Role::ADMIN).await?;
    Ok(Json(state.directory.list(&caller).await?))
}

/// PATCH /api/users/:id: change a user's role. Admin only.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn change_role<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let caller = state.authorize(&headers, Role::ADMIN).await?;
    let id = parse_id(&id)?;
    let Json(req) = payload?;
    Ok(Json(state.directory.change_role(&caller, id, req.role).await?))
}

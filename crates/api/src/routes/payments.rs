//! Payment intent endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use document_store::DocumentStore;
use domain::Role;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    /// Amount in minor currency units.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Order the intent will pay for; binds the intent to it.
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub id: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

/// POST /api/create-payment-intent: request a client secret for a charge.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create_intent<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> Result<Json<CreateIntentResponse>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let Json(req) = payload?;
    let order_id = req.order_id.as_deref().map(parse_id).transpose()?;
    let intent = state
        .payments
        .create_payment_intent(&caller, req.amount, order_id)
        .await?;

    Ok(Json(CreateIntentResponse {
        id: intent.id,
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
    }))
}

//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::Email;
use document_store::DocumentStore;
use domain::{DomainError, Order, OrderView, PlaceOrder, Role, StatusChange};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

/// POST /api/orders: place an order as the calling reader.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let caller = state.authorize(&headers, Role::USER).await?;
    let Json(cmd) = payload?;
    let order = state.ledger.place(&caller, cmd).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders: the orders visible to the caller, with books resolved.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let orders = state.ledger.list_for(&caller).await?;
    Ok(Json(state.ledger.populate(orders).await?))
}

/// GET /api/orders/user/:email: orders placed by one user.
#[tracing::instrument(skip(state, headers))]
pub async fn list_for_user<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let email = Email::parse(&email).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let orders = state.ledger.list_for_email(&caller, &email).await?;
    Ok(Json(state.ledger.populate(orders).await?))
}

/// GET /api/orders/:id: one order, if the caller may see it.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let id = parse_id(&id)?;
    let order = state.ledger.get_for(&caller, id).await?;
    Ok(Json(state.ledger.view(order).await?))
}

/// PATCH /api/orders/:id: change status and/or record a confirmed payment.
///
/// `paymentStatus: "paid"` is accepted only with a `paymentIntentId`, and is
/// applied through payment confirmation before any status change. A status
/// change the caller may not make is refused before the payment is touched.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let id = parse_id(&id)?;
    let Json(change) = payload?;

    let Some(intent_id) = change.validate()? else {
        return match change.status {
            Some(status) => Ok(Json(state.ledger.update_status(&caller, id, status).await?)),
            None => Err(ApiError::BadRequest("nothing to update".to_string())),
        };
    };

    if let Some(status) = change.status {
        let current = state.ledger.get_for(&caller, id).await?;
        state.ledger.check_status_change(&caller, &current, status)?;
    }

    let outcome = state
        .payments
        .confirm_order_payment(&caller, id, intent_id)
        .await?;
    let Some(status) = change.status else {
        return Ok(Json(outcome.into_order()));
    };

    match state.ledger.update_status(&caller, id, status).await {
        Ok(order) => Ok(Json(order)),
        Err(e) => {
            metrics::counter!("partial_completions_total").increment(1);
            tracing::error!(order_id = %id, error = %e, "order paid but status not changed");
            Err(DomainError::PartialCompletion {
                operation: "update_order",
                id: id.to_string(),
                reason: e.to_string(),
            }
            .into())
        }
    }
}

/// POST /api/orders/:id/payment: confirm payment with a succeeded intent.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn confirm_payment<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ConfirmPaymentRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let caller = state.authorize(&headers, Role::ANY).await?;
    let id = parse_id(&id)?;
    let Json(req) = payload?;
    let outcome = state
        .payments
        .confirm_order_payment(&caller, id, req.payment_intent_id.trim())
        .await?;
    Ok(Json(outcome.into_order()))
}

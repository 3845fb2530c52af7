//! HTTP API server with observability for the BookCourier backend.
//!
//! Provides REST endpoints for the catalog, orders, users, wishlists and
//! payments, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use document_store::DocumentStore;
use domain::{AccessControl, Catalog, Directory, IdentityVerifier, OrderLedger, Wishlist};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{PaymentBridge, PaymentProcessor};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{books, orders, payments, users, wishlist};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/books", get(books::list::<S>).post(books::create::<S>))
        .route(
            "/books/{id}",
            get(books::get::<S>)
                .patch(books::update::<S>)
                .delete(books::delete::<S>),
        )
        .route("/books/{id}/reviews", post(books::add_review::<S>))
        .route("/librarian/books", get(books::list_owned::<S>))
        .route("/admin/books", get(books::list_all::<S>))
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route("/orders/user/{email}", get(orders::list_for_user::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>).patch(orders::update::<S>),
        )
        .route("/orders/{id}/payment", post(orders::confirm_payment::<S>))
        .route("/users", get(users::list::<S>).post(users::register::<S>))
        .route("/users/me", get(users::me::<S>))
        .route("/users/{id}", patch(users::change_role::<S>))
        .route("/wishlist", get(wishlist::list::<S>).post(wishlist::add::<S>))
        .route("/wishlist/{book_id}", axum::routing::delete(wishlist::remove::<S>))
        .route("/create-payment-intent", post(payments::create_intent::<S>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over one store and the external collaborators.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    verifier: Arc<dyn IdentityVerifier>,
    processor: Arc<dyn PaymentProcessor>,
    currency: &str,
) -> Arc<AppState<S>> {
    let directory = Directory::new(store.clone());
    let ledger = OrderLedger::new(store.clone());

    Arc::new(AppState {
        access: AccessControl::new(verifier, directory.clone()),
        directory,
        catalog: Catalog::new(store.clone()),
        payments: PaymentBridge::new(processor, ledger.clone(), currency),
        ledger,
        wishlist: Wishlist::new(store),
    })
}

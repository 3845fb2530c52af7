//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use common::Email;
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use domain::{Directory, InMemoryIdentityVerifier};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::InMemoryPaymentProcessor;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the identity verifier from the configured `token=email` pairs.
fn identity_verifier(config: &Config) -> InMemoryIdentityVerifier {
    let tokens = config.auth_tokens.iter().filter_map(|(token, email)| {
        match Email::parse(email) {
            Ok(email) => Some((token.clone(), email)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping auth token with invalid email");
                None
            }
        }
    });
    InMemoryIdentityVerifier::with_tokens(tokens)
}

async fn serve<S: DocumentStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    // Ensure someone can assign roles on a fresh deployment
    if let Some(email) = &config.bootstrap_admin {
        let email = Email::parse(email).expect("BOOTSTRAP_ADMIN is not a valid email");
        Directory::new(store.clone())
            .bootstrap_admin(&email)
            .await
            .expect("failed to bootstrap admin user");
    }

    let verifier = Arc::new(identity_verifier(&config));
    let processor = Arc::new(InMemoryPaymentProcessor::new());
    let state = api::create_default_state(store, verifier, processor, &config.payment_currency);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the document store; a failed initial connection is fatal
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresDocumentStore::connect(&url, config.database_max_connections)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL document store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory document store");
            serve(InMemoryDocumentStore::new(), config, metrics_handle).await;
        }
    }
}

//! HTTP surface of the console.

pub mod auth;
pub mod client_types;
pub mod clients;
pub mod drafts;
pub mod invoices;
pub mod products;
pub mod reports;

#[cfg(test)]
mod tests;

use axum::{
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{http_client, BillingClient, CatalogClient, ReceivablesClient, SecurityClient};
use crate::auth::{jwt_middleware, SessionKeys};
use crate::config::Config;
use crate::draft::DraftStore;

/// Application state shared by all handlers.
///
/// Holds the remote service clients, the session signing keys and the
/// in-memory draft store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub billing: BillingClient,
    pub catalog: CatalogClient,
    pub receivables: ReceivablesClient,
    pub security: SecurityClient,
    pub sessions: SessionKeys,
    pub drafts: DraftStore,
}

impl AppState {
    /// Builds the state from configuration, with one shared HTTP client.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = http_client(config.http_timeout)?;
        Ok(Self {
            billing: BillingClient::new(http.clone(), config.billing_api_url.clone()),
            catalog: CatalogClient::new(http.clone(), config.catalog_api_url.clone()),
            receivables: ReceivablesClient::new(http.clone(), config.receivables_api_url.clone()),
            security: SecurityClient::new(http, config.security_api_url.clone()),
            sessions: SessionKeys::new(&config.jwt_secret, config.session_ttl_minutes),
            drafts: DraftStore::new(),
            config: Arc::new(config),
        })
    }
}

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "billing-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Creates the main application router.
///
/// Everything under `/api` requires a session token; `/health` and
/// `/auth/login` are public.
///
/// # Arguments
///
/// * `state` - The application state
///
/// # Returns
///
/// Returns a configured Axum Router.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/me", get(auth::me))
        .route("/navigation", get(auth::navigation))
        .route("/dashboard", get(reports::dashboard))
        .route("/client-types", get(client_types::list).post(client_types::create))
        .route("/client-types/:id", put(client_types::update).delete(client_types::remove))
        .route("/clients", get(clients::list).post(clients::create))
        .route("/clients/:id", put(clients::update).delete(clients::remove))
        .route("/products", get(products::list))
        .route("/invoices", get(invoices::list))
        .route("/invoices/mark-paid", post(invoices::mark_paid))
        .route("/invoices/reconcile", post(invoices::reconcile))
        .route("/invoices/:id", get(invoices::detail).delete(invoices::remove))
        .route("/invoices/:id/print", get(invoices::print))
        .route("/drafts", post(drafts::open))
        .route("/drafts/:id", get(drafts::show).delete(drafts::discard))
        .route("/drafts/:id/client", put(drafts::select_client))
        .route("/drafts/:id/payment", put(drafts::set_payment_type))
        .route("/drafts/:id/lines", post(drafts::add_line))
        .route("/drafts/:id/lines/:index", put(drafts::update_line).delete(drafts::remove_line))
        .route("/drafts/:id/credit-check", post(drafts::credit_check))
        .route("/drafts/:id/submit", post(drafts::submit))
        .route("/reports/clients", get(reports::clients))
        .route("/reports/invoices", get(reports::invoices))
        .route_layer(from_fn_with_state(state.clone(), jwt_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth::login))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

//! Billing console backend.
//!
//! Serves the invoicing console over HTTP: client types, clients, products,
//! invoices and reports, proxied from the remote billing, catalog,
//! receivables and security services, plus the invoice draft workflow with
//! its credit-limit check.

pub mod api;
pub mod auth;
pub mod config;
pub mod draft;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod reconcile;
pub mod reports;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

use billing_core::api::{http_client, BillingClient, ReceivablesClient};
use billing_core::config::Config;
use billing_core::init_tracing;
use billing_core::reconcile::Reconciler;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Worker binary that keeps credit invoice statuses in line with receivables.
///
/// Every `RECONCILE_INTERVAL_SECONDS` it marks as paid the credit invoices
/// still `Pendiente` that the receivables service no longer lists as open.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    init_tracing();

    info!("Starting Billing Reconciliation Worker...");

    let config = Config::from_env()?;
    let http = http_client(config.http_timeout)?;
    let billing = BillingClient::new(http.clone(), config.billing_api_url.clone());
    let receivables = ReceivablesClient::new(http, config.receivables_api_url.clone());

    let reconciler = Arc::new(Reconciler::new(
        billing,
        receivables,
        Some(config.reconcile_interval_seconds),
    ));

    let runner = Arc::clone(&reconciler);
    let handle = tokio::spawn(async move {
        if let Err(e) = runner.start().await {
            tracing::error!("Reconciler error: {}", e);
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            reconciler.stop().await;
        }
        _ = handle => {
            info!("Reconciler task completed");
        }
    }

    info!("Billing Reconciliation Worker stopped");
    Ok(())
}

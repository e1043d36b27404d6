use billing_core::config::Config;
use billing_core::handlers::{create_router, AppState};
use billing_core::init_tracing;
use chrono::{Duration as ChronoDuration, Utc};
use dotenv::dotenv;
use std::time::Duration;
use tracing::info;

/// How often idle drafts are swept from memory.
const DRAFT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing();

    info!("Starting Billing Console Server...");

    let config = Config::from_env()?;
    let host = config.server_host.clone();
    let port = config.server_port;
    let draft_ttl = ChronoDuration::minutes(config.session_ttl_minutes);

    let app_state = AppState::new(config)?;

    // Drafts of abandoned sessions would otherwise live forever
    let drafts = app_state.drafts.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DRAFT_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let dropped = drafts.purge_idle(Utc::now() - draft_ttl).await;
            if dropped > 0 {
                info!("Dropped {} idle draft(s)", dropped);
            }
        }
    });

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}:{}: {}", host, port, e))?;

    info!("Server listening on {}:{}", host, port);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

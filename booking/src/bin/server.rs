//! Visitor Bays server
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Opens the reservation store and applies the schema
//! - Serves the booking API and the Prometheus exporter
//! - Runs the sweeper until shutdown
//!
//! # Usage
//!
//! ```bash
//! # Start Postgres
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin visitor-bays
//! ```

use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visitor_bays::{BookingApp, Config, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},visitor_bays=debug,sqlx=warn", config.server.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Visitor Bays server...");

    config.validate()?;
    tracing::info!(
        backend = ?config.database.backend,
        bays = config.booking.total_bays,
        timezone = %config.booking.timezone,
        "Configuration loaded"
    );

    metrics::install_exporter(config.metrics_addr()?)?;

    let http_addr = config.http_addr()?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);

    let app = BookingApp::build(config).await?;
    tracing::info!("✓ Application initialized");

    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = app.sweeper().spawn(stop_rx);

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(%http_addr, "Visitor Bays listening");

    axum::serve(listener, app.router())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down gracefully...");
        })
        .await?;

    let _ = stop_tx.send(true);
    if tokio::time::timeout(shutdown_timeout, sweeper).await.is_err() {
        tracing::warn!(timeout = ?shutdown_timeout, "Sweeper did not stop in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

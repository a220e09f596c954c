//! AquaSentry offline worker entry point.
//!
//! Boots the interceptor in front of the dashboard backend. Logging goes to
//! stderr as JSON.

use anyhow::Result;
use aquasentry_client::{FetchClient, FetchConfig, Worker};
use aquasentry_core::{AppConfig, CacheDb};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        version = %config.cache_version,
        upstream = %config.upstream,
        db = %config.db_path.display(),
        "Starting aquasentry offline worker"
    );

    let cache = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app(&config)?)?);
    let worker = Arc::new(Worker::from_config(&config, fetcher, cache));

    // An install failure leaves the previous store (or plain passthrough) serving.
    match worker.start().await {
        Ok(state) => tracing::info!(%state, "worker started"),
        Err(e) => tracing::error!(error = %e, "worker failed to start; serving without this version"),
    }

    let app = handler::app(handler::AppState::new(worker, config.max_bytes));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

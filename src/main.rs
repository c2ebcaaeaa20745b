//! signal-relay server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket endpoint, health check
//! and static asset serving.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use signal_relay::api;
use signal_relay::app_state::AppState;
use signal_relay::config::{LogFormat, RelayConfig};
use signal_relay::domain::Registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        queue_capacity = config.outbound_queue_capacity,
        assets = %config.assets_dir.display(),
        "starting signal-relay"
    );

    // One registry for the whole process, handed to every connection
    let registry = Registry::spawn(config.registry());

    let listen_addr = config.listen_addr;
    let app_state = AppState {
        registry,
        config: Arc::new(config),
    };
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

//! trafficmedic -- local network traffic anomaly diagnostics.
//!
//! This crate samples interface throughput, flags statistically unusual
//! samples with an isolation forest, and maps each one to a remediation
//! hint. The dashboard API and CLI are thin layers over [`analysis`].

pub mod analysis;
pub mod api;
pub mod config;
pub mod detect;
pub mod system;

use anyhow::{Context, Result};

use crate::config::AppConfig;

/// Start the dashboard API server.
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;

    let state = api::state::AppState::new(&config);
    let app = api::router(state);

    tracing::info!(%addr, "trafficmedic listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}

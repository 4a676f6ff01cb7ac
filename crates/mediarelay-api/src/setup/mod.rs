//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use mediarelay_core::RelayConfig;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: RelayConfig) -> Result<(Arc<AppState>, axum::Router)> {
    mediarelay_infra::init_telemetry(
        config.log_format,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(environment = %config.environment, "Configuration loaded and validated");

    let state = services::initialize_services(&config).await?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}

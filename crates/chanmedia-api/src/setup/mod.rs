//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use chanmedia_core::Config;
use chanmedia_db::{DuplicateIndex, PgDuplicateIndex};
use chanmedia_infra::{init_telemetry, LogFormat};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    let log_format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|f| f.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_telemetry("chanmedia-api", config.environment(), log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let pool = chanmedia_db::connect(&config).await?;
    let index: Arc<dyn DuplicateIndex> = Arc::new(PgDuplicateIndex::new(pool));

    let (storage, signer) = storage::setup_storage(&config).await?;

    let state = services::initialize_services(&config, index, storage, signer).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

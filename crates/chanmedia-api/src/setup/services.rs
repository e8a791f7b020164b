//! Service initialization and application state setup

use anyhow::Result;
use chanmedia_core::Config;
use chanmedia_db::DuplicateIndex;
use chanmedia_infra::{CounterStore, MemoryCounterStore, RateLimiter, RatePolicy, RedisCounterStore};
use chanmedia_processing::{IngestPipeline, IngestPolicy, MediaThumbnailer};
use chanmedia_services::{PurgeService, ReconcileService, StatsService};
use chanmedia_storage::{Storage, UrlSigner};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::state::{AppState, HttpLimitState, IngestState, MaintenanceState, MediaState};

/// Counter store scope for upload admission.
pub const UPLOAD_SCOPE: &str = "upload";
/// Counter store scope for general request admission.
pub const HTTP_SCOPE: &str = "http";

/// Connect the shared counter store, or fall back to process memory when no Redis
/// URL is configured.
pub async fn setup_counter_store(config: &Config) -> Result<Arc<dyn CounterStore>> {
    match config.redis_url() {
        Some(url) => {
            let store = RedisCounterStore::connect(url).await?;
            store.ping().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "REDIS_URL not set, rate limits are enforced per process and not shared across replicas"
            );
            Ok(Arc::new(MemoryCounterStore::new()))
        }
    }
}

/// Wire every service over already-initialized backends. Spawns nothing.
pub fn build_state(
    config: &Config,
    index: Arc<dyn DuplicateIndex>,
    storage: Arc<dyn Storage>,
    signer: Option<UrlSigner>,
    counters: Arc<dyn CounterStore>,
) -> Arc<AppState> {
    let upload_limiter = RateLimiter::new(
        counters.clone(),
        UPLOAD_SCOPE,
        RatePolicy::new(config.upload_rate_limit(), config.upload_rate_window_secs()),
    );
    let http_limiter = RateLimiter::new(
        counters,
        HTTP_SCOPE,
        RatePolicy::new(config.http_rate_limit(), config.http_rate_window_secs()),
    );

    let thumbnailer = Arc::new(MediaThumbnailer::new(
        config.thumbnail_max_edge(),
        config.ffmpeg_path(),
    ));
    let pipeline = IngestPipeline::new(
        storage.clone(),
        index.clone(),
        thumbnailer,
        upload_limiter,
        IngestPolicy::from_config(config),
    );

    let maintenance = MaintenanceState {
        purge: PurgeService::new(index.clone(), storage.clone(), config.purge_min_age_days()),
        reconcile: Arc::new(ReconcileService::new(
            index.clone(),
            storage.clone(),
            Duration::from_secs(config.reconcile_grace_secs()),
            Duration::from_secs(config.reconcile_interval_secs()),
        )),
        stats: StatsService::new(index.clone()),
    };

    Arc::new(AppState {
        ingest: IngestState {
            pipeline: Arc::new(pipeline),
            banned_loaded_at: Utc::now(),
        },
        media: MediaState {
            index,
            storage,
            signer,
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_secs()),
        },
        maintenance,
        http: HttpLimitState {
            limiter: http_limiter,
            trusted_proxy_count: config.trusted_proxy_count(),
        },
    })
}

/// Initialize all services, returning the application state. Starts the
/// reconciliation loop when an interval is configured.
pub async fn initialize_services(
    config: &Config,
    index: Arc<dyn DuplicateIndex>,
    storage: Arc<dyn Storage>,
    signer: Option<UrlSigner>,
) -> Result<Arc<AppState>> {
    let counters = setup_counter_store(config).await?;
    let state = build_state(config, index, storage, signer, counters);

    if state.maintenance.reconcile.clone().start().is_some() {
        tracing::info!(
            interval_secs = config.reconcile_interval_secs(),
            grace_secs = config.reconcile_grace_secs(),
            "Orphan reconciliation scheduled"
        );
    }

    tracing::info!(
        upload_rate_limit = config.upload_rate_limit(),
        upload_rate_window_secs = config.upload_rate_window_secs(),
        http_rate_limit = config.http_rate_limit(),
        trusted_proxy_count = config.trusted_proxy_count(),
        purge_min_age_days = state.maintenance.purge.min_age_days(),
        "Services initialized"
    );

    Ok(state)
}

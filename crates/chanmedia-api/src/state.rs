//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers can extract only what they need
//! via Axum's `FromRef`.

use chanmedia_db::DuplicateIndex;
use chanmedia_infra::RateLimiter;
use chanmedia_processing::IngestPipeline;
use chanmedia_services::{PurgeService, ReconcileService, StatsService};
use chanmedia_storage::{Storage, UrlSigner};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

// ----- Sub-state types -----

/// The ingestion pipeline; its policy carries the per-request limits.
#[derive(Clone)]
pub struct IngestState {
    pub pipeline: Arc<IngestPipeline>,
    /// When the banned digest list was loaded
    pub banned_loaded_at: DateTime<Utc>,
}

/// Read side: descriptor lookup and URL signing.
#[derive(Clone)]
pub struct MediaState {
    pub index: Arc<dyn DuplicateIndex>,
    pub storage: Arc<dyn Storage>,
    /// Set when this process serves `/media/{*key}` itself (local backend)
    pub signer: Option<UrlSigner>,
    pub signed_url_ttl: Duration,
}

/// Purge, reconciliation and statistics.
#[derive(Clone)]
pub struct MaintenanceState {
    pub purge: PurgeService,
    pub reconcile: Arc<ReconcileService>,
    pub stats: StatsService,
}

/// Admission control for every route.
#[derive(Clone)]
pub struct HttpLimitState {
    pub limiter: RateLimiter,
    pub trusted_proxy_count: usize,
}

// ----- AppState -----

#[derive(Clone)]
pub struct AppState {
    pub ingest: IngestState,
    pub media: MediaState,
    pub maintenance: MaintenanceState,
    pub http: HttpLimitState,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for IngestState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.ingest.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for MediaState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.media.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for MaintenanceState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.maintenance.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for HttpLimitState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.http.clone()
    }
}

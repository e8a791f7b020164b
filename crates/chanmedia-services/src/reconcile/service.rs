use std::sync::Arc;
use std::time::Duration;

use chanmedia_core::constants::{MEDIA_KEY_PREFIX, THUMBNAIL_KEY_PREFIX};
use chanmedia_core::models::ReconcileReport;
use chanmedia_core::AppError;
use chanmedia_db::{DuplicateIndex, IndexError};
use chanmedia_storage::{Storage, StorageError};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::interval;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Storage(e) => e.into(),
            ReconcileError::Index(e) => e.into(),
        }
    }
}

/// Sweeps the object store for blobs that no descriptor references.
///
/// Such orphans appear when a write lands but the index record never happens
/// (crash, cancelled request, lost insert race with a different thumbnail). Objects
/// younger than the grace period are left alone so in-flight ingestions can finish.
#[derive(Clone)]
pub struct ReconcileService {
    index: Arc<dyn DuplicateIndex>,
    storage: Arc<dyn Storage>,
    grace: Duration,
    interval: Duration,
}

impl ReconcileService {
    /// A zero `interval` disables the background loop; on-demand sweeps still work.
    pub fn new(
        index: Arc<dyn DuplicateIndex>,
        storage: Arc<dyn Storage>,
        grace: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            index,
            storage,
            grace,
            interval,
        }
    }

    /// Start the periodic sweep. Returns `None` when the interval is zero.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.interval.is_zero() {
            tracing::info!("Orphan reconciliation disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            // First tick fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                tracing::info!("Starting scheduled orphan reconciliation");

                match self.sweep(false).await {
                    Ok(report) => tracing::info!(
                        scanned = report.scanned,
                        orphaned = report.orphaned,
                        deleted = report.deleted,
                        failed = report.failed,
                        "Reconciliation completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Reconciliation failed"),
                }
            }
        }))
    }

    pub async fn sweep(&self, dry_run: bool) -> Result<ReconcileReport, ReconcileError> {
        self.sweep_at(dry_run, Utc::now()).await
    }

    #[tracing::instrument(skip(self), fields(reconcile.grace_secs = self.grace.as_secs()))]
    pub async fn sweep_at(
        &self,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let grace = chrono::Duration::from_std(self.grace).unwrap_or(chrono::Duration::zero());
        let settled_before = now - grace;

        let mut report = ReconcileReport {
            dry_run,
            ..ReconcileReport::default()
        };

        for prefix in [MEDIA_KEY_PREFIX, THUMBNAIL_KEY_PREFIX] {
            let entries = self.storage.list(&format!("{}/", prefix)).await?;

            for entry in entries {
                report.scanned += 1;

                if entry.last_modified > settled_before {
                    continue;
                }
                if self.index.references_key(&entry.key).await? {
                    continue;
                }

                report.orphaned += 1;
                report.orphaned_bytes += entry.size_bytes;

                if dry_run {
                    tracing::debug!(storage_key = %entry.key, "Orphan found (dry run)");
                    continue;
                }

                match self.storage.delete(&entry.key).await {
                    Ok(()) => {
                        tracing::info!(
                            storage_key = %entry.key,
                            size_bytes = entry.size_bytes,
                            "Deleted orphaned blob"
                        );
                        report.deleted += 1;
                    }
                    Err(e) => {
                        tracing::error!(storage_key = %entry.key, error = %e, "Failed to delete orphaned blob");
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}

use std::sync::Arc;
use std::time::Instant;

use chanmedia_core::constants::{PURGE_MAX_AGE_DAYS, PURGE_MIN_AGE_DAYS};
use chanmedia_core::models::{MediaDescriptor, PurgeReport, PurgeRequest};
use chanmedia_core::AppError;
use chanmedia_db::{DuplicateIndex, IndexError, PurgeFilter};
use chanmedia_storage::Storage;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("olderThanDays must be at least {floor}, got {requested}")]
    BelowFloor { requested: u32, floor: u32 },

    #[error("olderThanDays must be at most {max}, got {requested}")]
    AboveCeiling { requested: u32, max: u32 },

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<PurgeError> for AppError {
    fn from(err: PurgeError) -> Self {
        match err {
            e @ (PurgeError::BelowFloor { .. } | PurgeError::AboveCeiling { .. }) => {
                AppError::InvalidInput(e.to_string())
            }
            PurgeError::Index(e) => e.into(),
        }
    }
}

/// Age-, type- and exclusion-driven bulk deletion of descriptors and their blobs.
#[derive(Clone)]
pub struct PurgeService {
    index: Arc<dyn DuplicateIndex>,
    storage: Arc<dyn Storage>,
    min_age_days: u32,
}

impl PurgeService {
    /// `min_age_days` can only raise the 30-day floor.
    pub fn new(index: Arc<dyn DuplicateIndex>, storage: Arc<dyn Storage>, min_age_days: u32) -> Self {
        Self {
            index,
            storage,
            min_age_days: min_age_days.max(PURGE_MIN_AGE_DAYS),
        }
    }

    pub fn min_age_days(&self) -> u32 {
        self.min_age_days
    }

    pub async fn purge(&self, request: &PurgeRequest) -> Result<PurgeReport, PurgeError> {
        self.purge_at(request, Utc::now()).await
    }

    /// Select candidates as of `now`, report them, and unless `dry_run` delete them.
    ///
    /// A dry run and a real run with identical filters select the same set. Each
    /// descriptor is removed from the index before its blobs, so a failed blob delete
    /// leaves an orphan for reconciliation rather than a dangling descriptor.
    #[tracing::instrument(
        skip(self, request),
        fields(
            older_than_days = request.older_than_days,
            dry_run = request.dry_run,
            task_id
        )
    )]
    pub async fn purge_at(
        &self,
        request: &PurgeRequest,
        now: DateTime<Utc>,
    ) -> Result<PurgeReport, PurgeError> {
        if !request.meets_floor(self.min_age_days) {
            return Err(PurgeError::BelowFloor {
                requested: request.older_than_days,
                floor: self.min_age_days,
            });
        }

        let cutoff = purge_cutoff(now, request.older_than_days).ok_or(PurgeError::AboveCeiling {
            requested: request.older_than_days,
            max: PURGE_MAX_AGE_DAYS,
        })?;

        let task_id = Uuid::new_v4();
        tracing::Span::current().record("task_id", tracing::field::display(task_id));
        let start = Instant::now();

        let filter = PurgeFilter {
            cutoff,
            mime_types: request.mime_types.clone(),
            exclude_keys: request.exclude_keys.clone(),
        };
        let candidates = self.index.purge_candidates(&filter).await?;

        let estimated_count = candidates.len() as u64;
        let estimated_bytes: u64 = candidates
            .iter()
            .map(|d| d.size_bytes.max(0) as u64)
            .sum();

        let mut report = PurgeReport {
            task_id,
            estimated_count,
            estimated_bytes,
            dry_run: request.dry_run,
            deleted_count: 0,
            failed_count: 0,
        };

        if request.dry_run {
            tracing::info!(
                estimated_count,
                estimated_bytes,
                "Purge dry run completed, nothing deleted"
            );
            return Ok(report);
        }

        for descriptor in &candidates {
            if self.delete_one(descriptor).await {
                report.deleted_count += 1;
            } else {
                report.failed_count += 1;
            }
        }

        tracing::info!(
            estimated_count,
            estimated_bytes,
            deleted = report.deleted_count,
            failed = report.failed_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Purge completed"
        );

        Ok(report)
    }

    async fn delete_one(&self, descriptor: &MediaDescriptor) -> bool {
        let digest = &descriptor.content_digest;

        match self.index.remove(digest).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(digest = %digest, "Descriptor already removed");
            }
            Err(e) => {
                tracing::error!(digest = %digest, error = %e, "Failed to remove descriptor");
                return false;
            }
        }

        let mut ok = true;
        for key in descriptor.owned_keys() {
            // A concurrent upload of the same bytes may have re-recorded the key.
            match self.index.references_key(key).await {
                Ok(false) => {}
                Ok(true) => {
                    tracing::info!(
                        digest = %digest,
                        storage_key = %key,
                        "Blob re-referenced since selection, kept"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        digest = %digest,
                        storage_key = %key,
                        error = %e,
                        "Failed to re-check blob reference, left for reconciliation"
                    );
                    ok = false;
                    continue;
                }
            }
            if let Err(e) = self.storage.delete(key).await {
                tracing::error!(
                    digest = %digest,
                    storage_key = %key,
                    error = %e,
                    "Failed to delete blob, left for reconciliation"
                );
                ok = false;
            }
        }
        ok
    }
}

/// `now` minus `older_than_days`, or `None` when the age is out of range.
fn purge_cutoff(now: DateTime<Utc>, older_than_days: u32) -> Option<DateTime<Utc>> {
    if older_than_days > PURGE_MAX_AGE_DAYS {
        return None;
    }
    Duration::try_days(i64::from(older_than_days)).and_then(|age| now.checked_sub_signed(age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chanmedia_core::models::MediaStats;
    use chanmedia_db::{IndexResult, InsertOutcome, MemoryDuplicateIndex};
    use chanmedia_storage::{LocalStorage, UrlSigner};
    use tempfile::TempDir;

    struct Fixture {
        service: PurgeService,
        index: Arc<MemoryDuplicateIndex>,
        storage: Arc<LocalStorage>,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let signer = UrlSigner::new(vec![7u8; 32]).unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost/media".to_string(), signer)
                .await
                .unwrap(),
        );
        let index = Arc::new(MemoryDuplicateIndex::new());
        Fixture {
            service: PurgeService::new(index.clone(), storage.clone(), 30),
            index,
            storage,
            _dir: dir,
        }
    }

    async fn seed(f: &Fixture, seed: char, mime: &str, size: usize, age_days: i64) -> MediaDescriptor {
        let digest = seed.to_string().repeat(64);
        let descriptor = MediaDescriptor {
            storage_key: format!("media/{}/{}.bin", &digest[..2], digest),
            thumbnail_key: Some(format!("thumbs/{}/{}s.jpg", &digest[..2], digest)),
            content_digest: digest,
            mime_type: mime.to_string(),
            size_bytes: size as i64,
            width: None,
            height: None,
            original_filename: None,
            spoiler: false,
            created_at: Utc::now() - Duration::days(age_days),
        };
        for key in descriptor.owned_keys() {
            f.storage
                .put(key, Bytes::from(vec![0u8; size]), mime)
                .await
                .unwrap();
        }
        f.index.record(&descriptor).await.unwrap();
        descriptor
    }

    #[tokio::test]
    async fn test_below_floor_rejected() {
        let f = fixture().await;
        let err = f.service.purge(&PurgeRequest::new(29, true)).await.unwrap_err();
        assert!(matches!(err, PurgeError::BelowFloor { requested: 29, floor: 30 }));
    }

    #[tokio::test]
    async fn test_configured_floor_only_raises() {
        let f = fixture().await;
        let lenient = PurgeService::new(f.index.clone(), f.storage.clone(), 7);
        assert_eq!(lenient.min_age_days(), 30);

        let strict = PurgeService::new(f.index.clone(), f.storage.clone(), 90);
        assert!(strict.purge(&PurgeRequest::new(60, true)).await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_then_real_run_removes_estimated_set() {
        let f = fixture().await;
        let old_a = seed(&f, 'a', "image/png", 100, 45).await;
        let old_b = seed(&f, 'b', "video/mp4", 300, 31).await;
        let fresh = seed(&f, 'c', "image/png", 50, 2).await;

        let dry = f.service.purge(&PurgeRequest::new(30, true)).await.unwrap();
        assert!(dry.dry_run);
        assert_eq!(dry.estimated_count, 2);
        assert_eq!(dry.estimated_bytes, 400);
        assert_eq!(dry.deleted_count, 0);
        assert_eq!(f.index.len(), 3);
        assert!(f.storage.exists(&old_a.storage_key).await.unwrap());

        let real = f.service.purge(&PurgeRequest::new(30, false)).await.unwrap();
        assert_eq!(real.estimated_count, dry.estimated_count);
        assert_eq!(real.estimated_bytes, dry.estimated_bytes);
        assert_eq!(real.deleted_count, 2);
        assert_eq!(real.failed_count, 0);
        assert_ne!(real.task_id, dry.task_id);

        assert_eq!(f.index.len(), 1);
        for d in [&old_a, &old_b] {
            for key in d.owned_keys() {
                assert!(!f.storage.exists(key).await.unwrap());
            }
        }
        assert!(f.storage.exists(&fresh.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_mime_filter_and_exclusions() {
        let f = fixture().await;
        let png = seed(&f, 'd', "image/png", 10, 40).await;
        let mp4 = seed(&f, 'e', "video/mp4", 10, 40).await;
        let kept = seed(&f, 'f', "image/png", 10, 40).await;

        let mut request = PurgeRequest::new(30, false);
        request.mime_types = vec!["image/png".to_string()];
        request.exclude_keys = vec![kept.content_digest.clone()];

        let report = f.service.purge(&request).await.unwrap();
        assert_eq!(report.deleted_count, 1);
        assert!(f.index.lookup(&png.content_digest).await.unwrap().is_none());
        assert!(f.index.lookup(&mp4.content_digest).await.unwrap().is_some());
        assert!(f.index.lookup(&kept.content_digest).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_nothing_old_enough() {
        let f = fixture().await;
        seed(&f, '9', "image/png", 10, 1).await;

        let report = f.service.purge(&PurgeRequest::new(30, false)).await.unwrap();
        assert_eq!(report.estimated_count, 0);
        assert_eq!(report.deleted_count, 0);
        assert_eq!(f.index.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_age_rejected_without_panic() {
        let f = fixture().await;

        let err = f.service.purge(&PurgeRequest::new(u32::MAX, true)).await.unwrap_err();
        assert!(matches!(
            err,
            PurgeError::AboveCeiling { requested: u32::MAX, max: PURGE_MAX_AGE_DAYS }
        ));
        assert!(matches!(AppError::from(err), AppError::InvalidInput(_)));

        let err = f
            .service
            .purge(&PurgeRequest::new(PURGE_MAX_AGE_DAYS + 1, false))
            .await
            .unwrap_err();
        assert!(matches!(err, PurgeError::AboveCeiling { .. }));

        let report = f
            .service
            .purge(&PurgeRequest::new(PURGE_MAX_AGE_DAYS, true))
            .await
            .unwrap();
        assert_eq!(report.estimated_count, 0);
    }

    #[test]
    fn test_purge_cutoff_bounds() {
        let now = Utc::now();
        assert_eq!(purge_cutoff(now, 30), Some(now - Duration::days(30)));
        assert!(purge_cutoff(now, PURGE_MAX_AGE_DAYS).is_some());
        assert!(purge_cutoff(now, u32::MAX).is_none());
        assert!(purge_cutoff(DateTime::<Utc>::MIN_UTC, 30).is_none());
    }

    /// Re-records every removed descriptor, as a same-bytes upload landing between
    /// the descriptor removal and the blob delete would.
    struct ReuploadingIndex {
        inner: MemoryDuplicateIndex,
    }

    #[async_trait]
    impl DuplicateIndex for ReuploadingIndex {
        async fn lookup(&self, content_digest: &str) -> IndexResult<Option<MediaDescriptor>> {
            self.inner.lookup(content_digest).await
        }

        async fn record(&self, descriptor: &MediaDescriptor) -> IndexResult<InsertOutcome> {
            self.inner.record(descriptor).await
        }

        async fn purge_candidates(&self, filter: &PurgeFilter) -> IndexResult<Vec<MediaDescriptor>> {
            self.inner.purge_candidates(filter).await
        }

        async fn remove(&self, content_digest: &str) -> IndexResult<bool> {
            let existing = self.inner.lookup(content_digest).await?;
            let removed = self.inner.remove(content_digest).await?;
            if let Some(mut descriptor) = existing {
                descriptor.created_at = Utc::now();
                self.inner.record(&descriptor).await?;
            }
            Ok(removed)
        }

        async fn references_key(&self, storage_key: &str) -> IndexResult<bool> {
            self.inner.references_key(storage_key).await
        }

        async fn stats(&self, now: DateTime<Utc>) -> IndexResult<MediaStats> {
            self.inner.stats(now).await
        }

        async fn ping(&self) -> IndexResult<()> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn test_reuploaded_blobs_survive_purge() {
        let f = fixture().await;
        let old = seed(&f, 'a', "image/png", 64, 45).await;

        let racing = Arc::new(ReuploadingIndex {
            inner: MemoryDuplicateIndex::new(),
        });
        racing.record(&old).await.unwrap();
        let service = PurgeService::new(racing.clone(), f.storage.clone(), 30);

        let report = service.purge(&PurgeRequest::new(30, false)).await.unwrap();
        assert_eq!(report.estimated_count, 1);

        let current = racing.lookup(&old.content_digest).await.unwrap().unwrap();
        for key in current.owned_keys() {
            assert!(f.storage.exists(key).await.unwrap(), "{key} was deleted");
        }
    }
}

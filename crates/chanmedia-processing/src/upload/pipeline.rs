use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chanmedia_core::models::MediaDescriptor;
use chanmedia_db::{DuplicateIndex, InsertOutcome};
use chanmedia_infra::{Decision, RateLimiter};
use chanmedia_storage::{keys, Storage, StorageError};
use chrono::Utc;

use super::types::{
    IngestError, IngestOutcome, IngestPolicy, IngestStage, ThumbnailStatus, Upload,
};
use crate::sniff::{SniffError, Sniffer};
use crate::thumbnail::{Thumbnail, ThumbnailDeriver, ThumbnailOutcome};

const MAX_FILENAME_LEN: usize = 255;

/// Reduce a client-supplied filename to a display-safe base name.
fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    if base.is_empty() || base.contains("..") {
        return None;
    }
    let cleaned: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    Some(cleaned)
}

/// Run `fut` under the stage deadline. Both failure and timeout count as a store fault
/// attributed to `stage`.
async fn within<T, E, F>(stage: IngestStage, deadline: Duration, fut: F) -> Result<T, IngestError>
where
    E: fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(IngestError::store_failed(stage, e)),
        Err(_) => Err(IngestError::store_failed(
            stage,
            format!("timed out after {}ms", deadline.as_millis()),
        )),
    }
}

/// The ingestion state machine.
///
/// `Received → Validated → DigestComputed → {DuplicateFound | NewContent → Thumbnailed
/// → Stored} → Recorded → Complete`, with terminal rejections along the way. Each
/// request drives its own pass; there is no global lock.
pub struct IngestPipeline {
    storage: Arc<dyn Storage>,
    index: Arc<dyn DuplicateIndex>,
    thumbnailer: Arc<dyn ThumbnailDeriver>,
    limiter: RateLimiter,
    sniffer: Sniffer,
    policy: IngestPolicy,
}

impl IngestPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        index: Arc<dyn DuplicateIndex>,
        thumbnailer: Arc<dyn ThumbnailDeriver>,
        limiter: RateLimiter,
        policy: IngestPolicy,
    ) -> Self {
        Self {
            storage,
            index,
            thumbnailer,
            limiter,
            sniffer: Sniffer::new(&policy.allowed_mime_types),
            policy,
        }
    }

    pub fn policy(&self) -> &IngestPolicy {
        &self.policy
    }

    /// Entry gate, run before any request body is buffered.
    ///
    /// The rate limiter is consulted first, then `declared_size` (when the transport
    /// knows it) is checked against the per-file maximum.
    pub async fn admit(
        &self,
        identity: &str,
        declared_size: Option<u64>,
    ) -> Result<IngestPermit<'_>, IngestError> {
        if let Decision::Denied { retry_after } = self.limiter.admit(identity).await {
            tracing::info!(identity = %identity, "Ingestion rejected by rate limiter");
            return Err(IngestError::RejectedRate { retry_after });
        }

        if let Some(size) = declared_size {
            self.check_size(size)?;
        }

        Ok(IngestPermit {
            pipeline: self,
            identity: identity.to_string(),
            accepted: AtomicUsize::new(0),
        })
    }

    /// `ingest(raw_bytes, declared_filename, spoiler, identity)` for a single file.
    pub async fn ingest(
        &self,
        data: Bytes,
        filename: Option<String>,
        spoiler: bool,
        identity: &str,
    ) -> Result<IngestOutcome, IngestError> {
        let permit = self.admit(identity, Some(data.len() as u64)).await?;
        permit
            .ingest(Upload {
                data,
                filename,
                spoiler,
            })
            .await
    }

    fn check_size(&self, size: u64) -> Result<(), IngestError> {
        if size > self.policy.max_file_size {
            return Err(IngestError::RejectedSize {
                size,
                limit: self.policy.max_file_size,
            });
        }
        Ok(())
    }
}

/// Proof that the caller passed the entry gate. One permit covers one request and at
/// most `max_files_per_request` files.
pub struct IngestPermit<'a> {
    pipeline: &'a IngestPipeline,
    identity: String,
    accepted: AtomicUsize,
}

impl IngestPermit<'_> {
    /// Check a running byte count while the caller is still buffering a file.
    pub fn check_size(&self, size: u64) -> Result<(), IngestError> {
        self.pipeline.check_size(size)
    }

    pub fn max_file_size(&self) -> u64 {
        self.pipeline.policy.max_file_size
    }

    #[tracing::instrument(
        skip_all,
        fields(identity = %self.identity, size_bytes = upload.data.len())
    )]
    pub async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        let start = Instant::now();
        let pipeline = self.pipeline;
        let policy = &pipeline.policy;

        // Received
        let max_files = policy.max_files_per_request;
        if self.accepted.fetch_add(1, Ordering::SeqCst) >= max_files {
            return Err(IngestError::TooManyFiles { max: max_files });
        }
        pipeline.check_size(upload.data.len() as u64)?;

        // Validated, then DigestComputed
        let fingerprint = pipeline
            .sniffer
            .sniff(upload.data.clone())
            .await
            .map_err(|e| match e {
                SniffError::Unrecognized => IngestError::RejectedType("unrecognized".to_string()),
                SniffError::Disallowed(mime) => IngestError::RejectedType(mime),
                SniffError::Digest(reason) => {
                    IngestError::store_failed(IngestStage::DigestComputed, reason)
                }
            })?;
        let digest = fingerprint.digest;
        let mime_type = fingerprint.mime_type;

        if policy.is_banned(&digest) {
            tracing::warn!(digest = %digest, "Rejected banned content");
            return Err(IngestError::RejectedBanned { digest });
        }

        let existing = within(
            IngestStage::DigestComputed,
            policy.stage_timeout,
            pipeline.index.lookup(&digest),
        )
        .await?;

        if let Some(descriptor) = existing {
            tracing::info!(
                digest = %digest,
                stage = %IngestStage::DuplicateFound,
                duration_ms = start.elapsed().as_millis() as u64,
                "Duplicate content, returning existing descriptor"
            );
            return Ok(IngestOutcome {
                descriptor,
                duplicate: true,
                thumbnail: ThumbnailStatus::Skipped,
            });
        }

        // NewContent
        let (thumbnail, mut thumbnail_status) = self.derive_thumbnail(&upload.data, &mime_type).await;

        // Stored
        let storage_key = keys::media_key(&digest, &mime_type)
            .map_err(|e| IngestError::store_failed(IngestStage::Stored, e))?;
        let thumbnail_target = match &thumbnail {
            Some(thumb) => Some((
                keys::thumbnail_key(&digest, thumb.mime_type)
                    .map_err(|e| IngestError::store_failed(IngestStage::Stored, e))?,
                thumb.data.clone(),
                thumb.mime_type,
            )),
            None => None,
        };

        let storage = pipeline.storage.clone();
        let original_key = storage_key.clone();
        let original = upload.data.clone();
        let original_mime = mime_type.clone();
        // Detached so a dropped request still finishes its in-flight writes.
        let write = tokio::spawn(async move {
            let mut written_thumbnail = None;
            if let Some((key, data, mime)) = thumbnail_target {
                match storage.put(&key, data, mime).await {
                    Ok(()) => written_thumbnail = Some(key),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Thumbnail write failed, continuing without it")
                    }
                }
            }
            storage.put(&original_key, original, &original_mime).await?;
            Ok::<_, StorageError>(written_thumbnail)
        });

        let thumbnail_key = match within(IngestStage::Stored, policy.stage_timeout, write).await? {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(key = %storage_key, error = %e, "Store write failed");
                return Err(IngestError::store_failed(IngestStage::Stored, e));
            }
        };
        if thumbnail.is_some() && thumbnail_key.is_none() {
            thumbnail_status = ThumbnailStatus::Degraded;
        }

        // Recorded
        let descriptor = MediaDescriptor {
            content_digest: digest.clone(),
            storage_key,
            mime_type,
            size_bytes: upload.data.len() as i64,
            width: thumbnail.as_ref().map(|t| t.source_width as i32),
            height: thumbnail.as_ref().map(|t| t.source_height as i32),
            thumbnail_key,
            original_filename: upload.filename.as_deref().and_then(sanitize_filename),
            spoiler: upload.spoiler,
            created_at: Utc::now(),
        };

        let recorded = within(
            IngestStage::Recorded,
            policy.stage_timeout,
            pipeline.index.record(&descriptor),
        )
        .await?;

        let duplicate = match &recorded {
            InsertOutcome::Inserted(_) => false,
            InsertOutcome::Existing(_) => {
                tracing::debug!(digest = %digest, "Concurrent ingestion recorded this digest first");
                true
            }
        };

        tracing::info!(
            digest = %digest,
            mime_type = %descriptor.mime_type,
            stage = %IngestStage::Complete,
            thumbnail = ?thumbnail_status,
            duplicate,
            duration_ms = start.elapsed().as_millis() as u64,
            "Ingestion complete"
        );

        Ok(IngestOutcome {
            descriptor: recorded.into_descriptor(),
            duplicate,
            thumbnail: thumbnail_status,
        })
    }

    /// Thumbnailed. Never fails the request.
    async fn derive_thumbnail(
        &self,
        data: &Bytes,
        mime_type: &str,
    ) -> (Option<Thumbnail>, ThumbnailStatus) {
        let deadline = self.pipeline.policy.stage_timeout;
        let derived = tokio::time::timeout(
            deadline,
            self.pipeline.thumbnailer.derive(data.clone(), mime_type),
        )
        .await;

        match derived {
            Ok(Ok(ThumbnailOutcome::Derived(thumb))) => (Some(thumb), ThumbnailStatus::Derived),
            Ok(Ok(ThumbnailOutcome::NotApplicable)) => (None, ThumbnailStatus::NotApplicable),
            Ok(Err(e)) => {
                tracing::warn!(
                    mime_type = %mime_type,
                    error = %e,
                    "Thumbnail derivation failed, storing original without thumbnail"
                );
                (None, ThumbnailStatus::Degraded)
            }
            Err(_) => {
                tracing::warn!(
                    mime_type = %mime_type,
                    timeout_ms = deadline.as_millis() as u64,
                    "Thumbnail derivation timed out, storing original without thumbnail"
                );
                (None, ThumbnailStatus::Degraded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_paths() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\cat.png").as_deref(),
            Some("cat.png")
        );
        assert_eq!(sanitize_filename("").as_deref(), None);
        assert_eq!(sanitize_filename("..").as_deref(), None);
    }

    #[test]
    fn test_sanitize_filename_replaces_unsafe_chars() {
        assert_eq!(
            sanitize_filename("my<cat>.png").as_deref(),
            Some("my_cat_.png")
        );
        let long = "a".repeat(400);
        assert_eq!(sanitize_filename(&long).map(|s| s.len()), Some(255));
    }

    #[tokio::test]
    async fn test_within_maps_timeout_to_stage_failure() {
        let result: Result<(), IngestError> = within(
            IngestStage::Stored,
            Duration::from_millis(5),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StorageError>(())
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(IngestError::StoreFailed {
                stage: IngestStage::Stored,
                ..
            })
        ));
    }
}

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chanmedia_core::constants::DEFAULT_ALLOWED_MIME_TYPES;
use chanmedia_core::models::MediaDescriptor;
use chanmedia_core::{AppError, Config};
use serde::Serialize;
use thiserror::Error;

/// Pipeline states, in execution order. Used for logging and to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Validated,
    DigestComputed,
    DuplicateFound,
    NewContent,
    Thumbnailed,
    Stored,
    Recorded,
    Complete,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Received => "received",
            IngestStage::Validated => "validated",
            IngestStage::DigestComputed => "digest_computed",
            IngestStage::DuplicateFound => "duplicate_found",
            IngestStage::NewContent => "new_content",
            IngestStage::Thumbnailed => "thumbnailed",
            IngestStage::Stored => "stored",
            IngestStage::Recorded => "recorded",
            IngestStage::Complete => "complete",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal rejections and failures. Every variant carries a distinct reason.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Rate limit exceeded, retry after {}s", .retry_after.as_secs())]
    RejectedRate { retry_after: Duration },

    #[error("File size {size} exceeds maximum {limit}")]
    RejectedSize { size: u64, limit: u64 },

    #[error("Unsupported file type: {0}")]
    RejectedType(String),

    #[error("Content is banned: {digest}")]
    RejectedBanned { digest: String },

    #[error("Too many files in one request (max {max})")]
    TooManyFiles { max: usize },

    #[error("Store failed at {stage}: {reason}")]
    StoreFailed { stage: IngestStage, reason: String },
}

impl IngestError {
    /// Stable machine-readable reason for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::RejectedRate { .. } => "rejected_rate",
            IngestError::RejectedSize { .. } => "rejected_size",
            IngestError::RejectedType(_) => "rejected_type",
            IngestError::RejectedBanned { .. } => "rejected_banned",
            IngestError::TooManyFiles { .. } => "too_many_files",
            IngestError::StoreFailed { .. } => "store_failed",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::RejectedRate { .. } | IngestError::StoreFailed { .. }
        )
    }

    pub(crate) fn store_failed(stage: IngestStage, reason: impl fmt::Display) -> Self {
        IngestError::StoreFailed {
            stage,
            reason: reason.to_string(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::RejectedRate { retry_after } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                AppError::RateLimited {
                    retry_after_secs: secs.max(1),
                }
            }
            IngestError::RejectedSize { size, limit } => AppError::PayloadTooLarge { size, limit },
            IngestError::RejectedType(mime) => AppError::UnsupportedMediaType(mime),
            IngestError::RejectedBanned { digest } => AppError::ContentBanned(digest),
            IngestError::TooManyFiles { max } => AppError::TooManyFiles { max },
            e @ IngestError::StoreFailed { .. } => AppError::StoreFailed(e.to_string()),
        }
    }
}

/// Bytes and metadata already extracted from the transport.
///
/// `filename` is kept for display only and has no influence on classification.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Bytes,
    pub filename: Option<String>,
    pub spoiler: bool,
}

impl Upload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            spoiler: false,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_spoiler(mut self, spoiler: bool) -> Self {
        self.spoiler = spoiler;
        self
    }
}

/// What happened to the thumbnail of an ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailStatus {
    Derived,
    NotApplicable,
    /// Visual payload that could not be rendered; the original was stored anyway.
    Degraded,
    /// Duplicate hit, nothing was derived.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub descriptor: MediaDescriptor,
    /// True when the digest was already indexed and nothing new was written.
    pub duplicate: bool,
    pub thumbnail: ThumbnailStatus,
}

/// Size, type, count and deadline policy applied by the pipeline.
#[derive(Debug, Clone)]
pub struct IngestPolicy {
    pub max_file_size: u64,
    pub max_files_per_request: usize,
    pub allowed_mime_types: Vec<String>,
    pub banned_digests: HashSet<String>,
    /// Deadline applied to each I/O-bound stage separately.
    pub stage_timeout: Duration,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_files_per_request: 4,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            banned_digests: HashSet::new(),
            stage_timeout: Duration::from_secs(30),
        }
    }
}

impl IngestPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes(),
            max_files_per_request: config.max_files_per_request(),
            allowed_mime_types: config.allowed_mime_types().to_vec(),
            banned_digests: config
                .banned_digests()
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            stage_timeout: Duration::from_secs(config.stage_timeout_secs()),
        }
    }

    pub fn is_banned(&self, digest: &str) -> bool {
        self.banned_digests.contains(digest)
    }

    /// Banned digests in sorted order.
    pub fn banned_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self.banned_digests.iter().cloned().collect();
        list.sort_unstable();
        list
    }
}

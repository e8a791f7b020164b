//! Duplicate index: content digest to stored-object descriptor.

mod memory;
mod postgres;

pub use memory::MemoryDuplicateIndex;
pub use postgres::PgDuplicateIndex;

use async_trait::async_trait;
use chanmedia_core::models::{MediaDescriptor, MediaStats};
use chanmedia_core::AppError;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Database(e) => AppError::Database(e),
            IndexError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}

/// Result of an atomic insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The descriptor was new and is now visible to readers.
    Inserted(MediaDescriptor),
    /// Another writer recorded this digest first; this is the winning descriptor.
    Existing(MediaDescriptor),
}

impl InsertOutcome {
    pub fn descriptor(&self) -> &MediaDescriptor {
        match self {
            InsertOutcome::Inserted(d) | InsertOutcome::Existing(d) => d,
        }
    }

    pub fn into_descriptor(self) -> MediaDescriptor {
        match self {
            InsertOutcome::Inserted(d) | InsertOutcome::Existing(d) => d,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Selection criteria for purge.
#[derive(Debug, Clone)]
pub struct PurgeFilter {
    /// Descriptors created strictly before this instant are candidates.
    pub cutoff: DateTime<Utc>,
    /// Empty means every type.
    pub mime_types: Vec<String>,
    /// Matches either a content digest or a storage key.
    pub exclude_keys: Vec<String>,
}

impl PurgeFilter {
    pub fn matches(&self, descriptor: &MediaDescriptor) -> bool {
        if descriptor.created_at >= self.cutoff {
            return false;
        }
        if !self.mime_types.is_empty()
            && !self
                .mime_types
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&descriptor.mime_type))
        {
            return false;
        }
        !self
            .exclude_keys
            .iter()
            .any(|k| k == &descriptor.content_digest || k == &descriptor.storage_key)
    }
}

/// The duplicate index contract.
///
/// `lookup` is consulted before any object store write. `record` is called once per
/// new descriptor, after the write succeeded, and must be an atomic insert-if-absent:
/// with concurrent writers of the same digest exactly one descriptor becomes visible.
#[async_trait]
pub trait DuplicateIndex: Send + Sync {
    async fn lookup(&self, content_digest: &str) -> IndexResult<Option<MediaDescriptor>>;

    async fn record(&self, descriptor: &MediaDescriptor) -> IndexResult<InsertOutcome>;

    /// Candidates ordered oldest first.
    async fn purge_candidates(&self, filter: &PurgeFilter) -> IndexResult<Vec<MediaDescriptor>>;

    /// Returns true when a descriptor was removed.
    async fn remove(&self, content_digest: &str) -> IndexResult<bool>;

    /// True when `storage_key` is the original or thumbnail of some descriptor.
    async fn references_key(&self, storage_key: &str) -> IndexResult<bool>;

    async fn stats(&self, now: DateTime<Utc>) -> IndexResult<MediaStats>;

    /// Cheap readiness probe.
    async fn ping(&self) -> IndexResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn descriptor(digest: &str, mime: &str, age_days: i64) -> MediaDescriptor {
        MediaDescriptor {
            content_digest: digest.to_string(),
            storage_key: format!("media/{}/{}.bin", &digest[..2], digest),
            mime_type: mime.to_string(),
            size_bytes: 1,
            width: None,
            height: None,
            thumbnail_key: None,
            original_filename: None,
            spoiler: false,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_filter_age_cutoff() {
        let filter = PurgeFilter {
            cutoff: Utc::now() - Duration::days(30),
            mime_types: vec![],
            exclude_keys: vec![],
        };
        assert!(filter.matches(&descriptor(&"a".repeat(64), "image/png", 31)));
        assert!(!filter.matches(&descriptor(&"b".repeat(64), "image/png", 29)));
    }

    #[test]
    fn test_filter_mime_and_exclusions() {
        let old = descriptor(&"c".repeat(64), "image/png", 40);
        let mut filter = PurgeFilter {
            cutoff: Utc::now() - Duration::days(30),
            mime_types: vec!["video/mp4".to_string()],
            exclude_keys: vec![],
        };
        assert!(!filter.matches(&old));

        filter.mime_types = vec!["IMAGE/PNG".to_string()];
        assert!(filter.matches(&old));

        filter.exclude_keys = vec![old.storage_key.clone()];
        assert!(!filter.matches(&old));

        filter.exclude_keys = vec![old.content_digest.clone()];
        assert!(!filter.matches(&old));
    }
}

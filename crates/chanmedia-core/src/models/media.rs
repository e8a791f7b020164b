use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Canonical record of one stored object, keyed by its content digest.
///
/// Exactly one descriptor exists per distinct digest. Re-ingesting identical bytes
/// returns the existing descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    /// Hex SHA-256 of the raw bytes
    pub content_digest: String,
    pub storage_key: String,
    /// Sniffed from the bytes, never taken from the client
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub thumbnail_key: Option<String>,
    pub original_filename: Option<String>,
    pub spoiler: bool,
    pub created_at: DateTime<Utc>,
}

impl MediaDescriptor {
    /// Pixel dimensions, present only for visual types that decoded successfully.
    pub fn dimensions(&self) -> Option<(i32, i32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    /// Storage keys owned by this descriptor, thumbnail first.
    pub fn owned_keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(2);
        if let Some(thumb) = self.thumbnail_key.as_deref() {
            keys.push(thumb);
        }
        keys.push(self.storage_key.as_str());
        keys
    }
}

/// Descriptor plus freshly minted retrieval URLs, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaResponse {
    #[serde(flatten)]
    pub descriptor: MediaDescriptor,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub url_expires_at: DateTime<Utc>,
    /// True when the content already existed and no new object was written
    pub duplicate: bool,
}

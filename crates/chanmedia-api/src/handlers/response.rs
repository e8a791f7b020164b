use std::time::Duration;

use chanmedia_core::models::{MediaDescriptor, MediaResponse};
use chanmedia_storage::StorageResult;
use chrono::Utc;

use crate::state::MediaState;

/// Attach freshly minted retrieval URLs to `descriptor`.
pub async fn with_signed_urls(
    media: &MediaState,
    descriptor: MediaDescriptor,
    duplicate: bool,
    ttl: Duration,
) -> StorageResult<MediaResponse> {
    let url = media.storage.signed_url(&descriptor.storage_key, ttl).await?;
    let thumbnail_url = match descriptor.thumbnail_key.as_deref() {
        Some(key) => Some(media.storage.signed_url(key, ttl).await?),
        None => None,
    };
    let url_expires_at = Utc::now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

    Ok(MediaResponse {
        descriptor,
        url,
        thumbnail_url,
        url_expires_at,
        duplicate,
    })
}

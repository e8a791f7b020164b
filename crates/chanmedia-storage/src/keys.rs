//! Content-addressed key derivation shared by every backend.

use crate::{StorageError, StorageResult};
use chanmedia_core::constants::{is_content_digest, MEDIA_KEY_PREFIX, THUMBNAIL_KEY_PREFIX};

/// File extension for a sniffed MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/x-7z-compressed" => "7z",
        _ => "bin",
    }
}

/// MIME type implied by a key's extension, for serving stored objects.
pub fn mime_for_key(storage_key: &str) -> &'static str {
    match storage_key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("7z") => "application/x-7z-compressed",
        _ => "application/octet-stream",
    }
}

fn shard(digest: &str) -> StorageResult<&str> {
    if !is_content_digest(digest) {
        return Err(StorageError::InvalidKey(format!(
            "Not a content digest: {}",
            digest
        )));
    }
    Ok(&digest[..2])
}

/// Key for an original upload: `media/{d[0..2]}/{d}.{ext}`.
pub fn media_key(digest: &str, mime_type: &str) -> StorageResult<String> {
    let digest = digest.to_ascii_lowercase();
    let prefix = shard(&digest)?;
    Ok(format!(
        "{}/{}/{}.{}",
        MEDIA_KEY_PREFIX,
        prefix,
        digest,
        extension_for_mime(mime_type)
    ))
}

/// Key for a derived thumbnail: `thumbs/{d[0..2]}/{d}s.{ext}`.
pub fn thumbnail_key(digest: &str, thumb_mime_type: &str) -> StorageResult<String> {
    let digest = digest.to_ascii_lowercase();
    let prefix = shard(&digest)?;
    Ok(format!(
        "{}/{}/{}s.{}",
        THUMBNAIL_KEY_PREFIX,
        prefix,
        digest,
        extension_for_mime(thumb_mime_type)
    ))
}

/// Reject keys that could escape a backend's namespace.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.contains("..")
        || storage_key.starts_with('/')
        || storage_key.contains('\\')
        || storage_key.contains('\0')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

//! Media policy constants.

/// MIME types accepted by ingestion unless `ALLOWED_MIME_TYPES` overrides them.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "application/pdf",
    "application/zip",
    "application/x-7z-compressed",
];

/// Lowest age accepted by the purge interface. Configuration may raise it, never lower it.
pub const PURGE_MIN_AGE_DAYS: u32 = 30;

/// Highest age accepted by the purge interface (about a century).
pub const PURGE_MAX_AGE_DAYS: u32 = 36_500;

/// Default lifetime of a signed retrieval URL (7 days).
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper bound for a caller-requested signed URL lifetime.
pub const MAX_SIGNED_URL_TTL_SECS: u64 = DEFAULT_SIGNED_URL_TTL_SECS;

/// Longest thumbnail edge in pixels.
pub const DEFAULT_THUMBNAIL_MAX_EDGE: u32 = 250;

/// Key prefix for original uploads.
pub const MEDIA_KEY_PREFIX: &str = "media";

/// Key prefix for derived thumbnails.
pub const THUMBNAIL_KEY_PREFIX: &str = "thumbs";

/// Hex length of a SHA-256 content digest.
pub const CONTENT_DIGEST_HEX_LEN: usize = 64;

/// Returns true when `mime_type` can carry a visual rendition.
pub fn is_visual_mime(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type.starts_with("video/")
}

/// Returns true when `value` looks like a hex SHA-256 digest.
pub fn is_content_digest(value: &str) -> bool {
    value.len() == CONTENT_DIGEST_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

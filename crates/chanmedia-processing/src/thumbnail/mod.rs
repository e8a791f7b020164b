//! Thumbnail derivation.
//!
//! Derivation has three outcomes and callers must keep them apart: a rendition was
//! produced, the type has no visual rendition ([`ThumbnailOutcome::NotApplicable`]),
//! or the payload sniffed as visual but could not be decoded ([`ThumbnailError`]).
//! Only the last is a degraded result.

#[cfg(feature = "image")]
pub mod raster;
#[cfg(feature = "video")]
pub mod video;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use chanmedia_core::constants::DEFAULT_THUMBNAIL_MAX_EDGE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Failed to decode source: {0}")]
    Decode(String),

    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),

    #[error("Frame extraction failed: {0}")]
    Extract(String),
}

/// A derived rendition and the dimensions of the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub data: Bytes,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    Derived(Thumbnail),
    NotApplicable,
}

/// `derive(bytes, mime_type)`: a pure function of its inputs.
#[async_trait]
pub trait ThumbnailDeriver: Send + Sync {
    async fn derive(&self, data: Bytes, mime_type: &str)
        -> Result<ThumbnailOutcome, ThumbnailError>;
}

/// Raster images through the `image` crate, video through a single FFmpeg frame grab.
#[derive(Debug, Clone)]
pub struct MediaThumbnailer {
    max_edge: u32,
    ffmpeg_path: PathBuf,
}

impl Default for MediaThumbnailer {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_MAX_EDGE, "ffmpeg")
    }
}

impl MediaThumbnailer {
    pub fn new(max_edge: u32, ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            max_edge: max_edge.max(1),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn max_edge(&self) -> u32 {
        self.max_edge
    }

    #[cfg(feature = "image")]
    async fn derive_image(&self, data: Bytes) -> Result<ThumbnailOutcome, ThumbnailError> {
        let max_edge = self.max_edge;
        let thumb = tokio::task::spawn_blocking(move || raster::render(&data, max_edge))
            .await
            .map_err(|e| ThumbnailError::Decode(e.to_string()))??;
        Ok(ThumbnailOutcome::Derived(thumb))
    }

    #[cfg(feature = "video")]
    async fn derive_video(
        &self,
        data: Bytes,
        mime_type: &str,
    ) -> Result<ThumbnailOutcome, ThumbnailError> {
        let frame = video::extract_first_frame(&self.ffmpeg_path, &data, mime_type).await?;
        self.derive_image(frame).await
    }
}

#[async_trait]
impl ThumbnailDeriver for MediaThumbnailer {
    #[tracing::instrument(skip(self, data), fields(size_bytes = data.len()))]
    async fn derive(
        &self,
        data: Bytes,
        mime_type: &str,
    ) -> Result<ThumbnailOutcome, ThumbnailError> {
        match mime_type {
            #[cfg(feature = "image")]
            m if m.starts_with("image/") => self.derive_image(data).await,
            #[cfg(feature = "video")]
            m if m.starts_with("video/") => self.derive_video(data, m).await,
            _ => Ok(ThumbnailOutcome::NotApplicable),
        }
    }
}

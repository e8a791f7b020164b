//! First-frame extraction for video sources.

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use chanmedia_storage::keys::extension_for_mime;
use tokio::process::Command;

use super::ThumbnailError;

/// Grab the first video frame as PNG by running FFmpeg over a scratch copy of `data`.
///
/// The scratch directory is removed when this returns, and the child is killed if
/// the caller drops the future.
pub async fn extract_first_frame(
    ffmpeg_path: &Path,
    data: &[u8],
    mime_type: &str,
) -> Result<Bytes, ThumbnailError> {
    let start = Instant::now();
    let scratch = tempfile::tempdir().map_err(|e| ThumbnailError::Extract(e.to_string()))?;
    let input = scratch
        .path()
        .join(format!("source.{}", extension_for_mime(mime_type)));
    let output_path = scratch.path().join("frame.png");

    tokio::fs::write(&input, data)
        .await
        .map_err(|e| ThumbnailError::Extract(format!("Failed to write scratch file: {}", e)))?;

    let output = Command::new(ffmpeg_path)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(&input)
        .args(["-frames:v", "1", "-f", "image2", "-c:v", "png"])
        .arg(&output_path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ThumbnailError::Extract(format!("Failed to execute ffmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(ThumbnailError::Decode(format!(
            "ffmpeg failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let frame = tokio::fs::read(&output_path)
        .await
        .map_err(|e| ThumbnailError::Decode(format!("ffmpeg produced no frame: {}", e)))?;

    tracing::debug!(
        duration_ms = start.elapsed().as_millis() as u64,
        frame_bytes = frame.len(),
        "Extracted video frame"
    );

    Ok(Bytes::from(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_ffmpeg_binary_is_extract_error() {
        let result = extract_first_frame(
            Path::new("/nonexistent/ffmpeg-binary"),
            b"\x1a\x45\xdf\xa3",
            "video/webm",
        )
        .await;
        assert!(matches!(result, Err(ThumbnailError::Extract(_))));
    }
}

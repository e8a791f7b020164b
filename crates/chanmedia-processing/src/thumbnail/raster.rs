//! Raster thumbnail rendering.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};

use super::{Thumbnail, ThumbnailError};

const JPEG_QUALITY: u8 = 85;
const MAX_SOURCE_EDGE: u32 = 16_384;
const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

/// Decode `data` and shrink it so neither edge exceeds `max_edge`.
///
/// Aspect ratio is preserved and sources already within bounds keep their size.
/// Sources with an alpha channel come out as PNG, everything else as JPEG.
pub fn render(data: &[u8], max_edge: u32) -> Result<Thumbnail, ThumbnailError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_EDGE);
    limits.max_image_height = Some(MAX_SOURCE_EDGE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;
    reader.limits(limits);
    let img = reader
        .decode()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    let (source_width, source_height) = img.dimensions();
    let thumb = if source_width > max_edge || source_height > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };
    let (width, height) = thumb.dimensions();

    let (data, mime_type) = if thumb.color().has_alpha() {
        (encode_png(&thumb)?, "image/png")
    } else {
        (encode_jpeg(&thumb)?, "image/jpeg")
    };

    Ok(Thumbnail {
        data,
        mime_type,
        width,
        height,
        source_width,
        source_height,
    })
}

fn encode_png(img: &DynamicImage) -> Result<Bytes, ThumbnailError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
    Ok(Bytes::from(buffer))
}

fn encode_jpeg(img: &DynamicImage) -> Result<Bytes, ThumbnailError> {
    let (width, height) = img.dimensions();
    let mut buffer = Vec::with_capacity((width * height) as usize);
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
    Ok(Bytes::from(buffer))
}

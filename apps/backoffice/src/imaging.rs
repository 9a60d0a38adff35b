//! # Image Optimisation
//!
//! Uploaded pictures larger than 800 px on either side are scaled down to
//! fit 800×800, keeping their aspect ratio and their format.
//!
//! ```text
//! upload (jpg/png)
//!      │
//!      ▼
//! decode ── fails ──► ImagingError (caller logs, keeps original bytes)
//!      │
//!      ├── both sides ≤ 800 ──► unchanged
//!      │
//!      ▼
//! resize to fit 800×800 ──► re-encode (JPEG q85 / PNG)
//! ```
//!
//! Decoding and encoding are CPU bound, so they run on the blocking pool.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

/// Longest side allowed before an image is scaled down.
pub const MAX_DIMENSION: u32 = 800;

/// JPEG re-encoding quality.
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Image task failed: {0}")]
    Task(String),
}

fn format_for(extension: &str) -> Option<ImageFormat> {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        _ => None,
    }
}

/// Downscales `bytes` when needed.
///
/// ## Returns
/// `Ok(None)` when the image is already small enough or is not a JPEG or
/// PNG; `Ok(Some(bytes))` with the re-encoded image otherwise.
pub fn optimize_blocking(bytes: &[u8], extension: &str) -> Result<Option<Vec<u8>>, ImagingError> {
    let Some(format) = format_for(extension) else {
        return Ok(None);
    };

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImagingError::Decode(e.to_string()))?;

    if img.width() <= MAX_DIMENSION && img.height() <= MAX_DIMENSION {
        return Ok(None);
    }

    let resized = img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
    debug!(
        from_width = img.width(),
        from_height = img.height(),
        width = resized.width(),
        height = resized.height(),
        "Image downscaled"
    );

    encode(&resized, format).map(Some)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImagingError> {
    let mut out = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
                .encode_image(&rgb)
                .map_err(|e| ImagingError::Encode(e.to_string()))?;
        }
        _ => {
            img.write_to(&mut Cursor::new(&mut out), format)
                .map_err(|e| ImagingError::Encode(e.to_string()))?;
        }
    }

    Ok(out)
}

/// Runs [`optimize_blocking`] on the blocking pool.
pub async fn optimize(bytes: Vec<u8>, extension: &str) -> Result<Option<Vec<u8>>, ImagingError> {
    let extension = extension.to_string();
    tokio::task::spawn_blocking(move || optimize_blocking(&bytes, &extension))
        .await
        .map_err(|e| ImagingError::Task(e.to_string()))?
}

/// The bytes to store for an upload: optimised when possible, the original
/// bytes when optimisation fails.
pub async fn best_effort(bytes: Vec<u8>, extension: &str) -> Vec<u8> {
    match optimize(bytes.clone(), extension).await {
        Ok(Some(optimized)) => optimized,
        Ok(None) => bytes,
        Err(e) => {
            warn!(extension = %extension, error = %e, "Image optimisation failed, keeping original");
            bytes
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    /// A solid-colour picture encoded as `format`.
    pub(crate) fn picture(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([200, 30, 30])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_large_png_is_downscaled_keeping_aspect() {
        let bytes = picture(1600, 400, ImageFormat::Png);
        let out = optimize_blocking(&bytes, "png").unwrap().unwrap();

        assert_eq!(dimensions(&out), (800, 200));
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_large_jpeg_stays_jpeg() {
        let bytes = picture(1000, 2000, ImageFormat::Jpeg);
        let out = optimize_blocking(&bytes, "JPG").unwrap().unwrap();

        assert_eq!(dimensions(&out), (400, 800));
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_small_and_unsupported_are_untouched() {
        let bytes = picture(800, 600, ImageFormat::Png);
        assert!(optimize_blocking(&bytes, "png").unwrap().is_none());
        assert!(optimize_blocking(b"not a video", "webm").unwrap().is_none());
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let err = optimize_blocking(b"definitely not a png", "png").unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }

    #[tokio::test]
    async fn test_best_effort_keeps_original_on_failure() {
        let garbage = b"broken".to_vec();
        assert_eq!(best_effort(garbage.clone(), "jpg").await, garbage);

        let large = picture(900, 900, ImageFormat::Png);
        let out = best_effort(large.clone(), "png").await;
        assert_eq!(dimensions(&out), (800, 800));
    }
}

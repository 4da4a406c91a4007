//! Product photo processing.
//!
//! Uploads are decoded, scaled down to at most 800 pixels wide, re-encoded as
//! JPEG, and written under the upload directory with a random file name.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Images wider than this are scaled down.
const MAX_WIDTH: u32 = 800;

const JPEG_QUALITY: u8 = 80;

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// URL path under which the upload directory is served.
const PUBLIC_PREFIX: &str = "/static/uploads";

/// Errors from image processing.
#[derive(Debug, Error)]
pub enum ImageError {
    /// File extension is not png, jpg, or jpeg.
    #[error("unsupported image format")]
    UnsupportedFormat,

    /// The bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// JPEG encoding failed.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// Writing the file failed.
    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking worker panicked or was cancelled.
    #[error("image worker failed: {0}")]
    Worker(String),
}

/// Writes processed photos into the upload directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    upload_dir: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub const fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }

    /// Process and store an upload, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedFormat` for other extensions,
    /// `ImageError::Decode` for corrupt data, or `ImageError::Io` if the file
    /// cannot be written.
    pub async fn save(&self, file_name: &str, data: Vec<u8>) -> Result<String, ImageError> {
        check_extension(file_name)?;

        let jpeg = tokio::task::spawn_blocking(move || to_resized_jpeg(&data))
            .await
            .map_err(|e| ImageError::Worker(e.to_string()))??;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let name = format!("{}.jpg", uuid::Uuid::new_v4());
        tokio::fs::write(self.upload_dir.join(&name), jpeg).await?;

        tracing::info!(file = %name, "Stored product image");
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }
}

fn check_extension(file_name: &str) -> Result<(), ImageError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ImageError::UnsupportedFormat)
    }
}

/// Decode, shrink to `MAX_WIDTH` keeping the aspect ratio, and encode as JPEG.
/// Narrower images keep their size.
fn to_resized_jpeg(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(data).map_err(|e| ImageError::Decode(e.to_string()))?;

    let img = if img.width() > MAX_WIDTH {
        let height = u64::from(img.height()) * u64::from(MAX_WIDTH) / u64::from(img.width());
        let height = u32::try_from(height.max(1)).unwrap_or(u32::MAX);
        img.resize_exact(MAX_WIDTH, height, FilterType::Lanczos3)
    } else {
        img
    };

    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
        img.to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
    }
    Ok(buffer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GenericImageView, ImageFormat, RgbImage};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 180]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_extension_check() {
        assert!(check_extension("bunny.PNG").is_ok());
        assert!(check_extension("bunny.jpeg").is_ok());
        assert!(matches!(
            check_extension("bunny.gif"),
            Err(ImageError::UnsupportedFormat)
        ));
        assert!(matches!(
            check_extension("bunny"),
            Err(ImageError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_wide_images_are_scaled_to_800() {
        let jpeg = to_resized_jpeg(&png(1600, 400)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.dimensions(), (800, 200));
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let jpeg = to_resized_jpeg(&png(120, 90)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.dimensions(), (120, 90));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(matches!(
            to_resized_jpeg(b"definitely not an image"),
            Err(ImageError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_save_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("uploads"));

        let url = store.save("photo.png", png(50, 50)).await.unwrap();
        assert!(url.starts_with("/static/uploads/"));
        assert!(url.ends_with(".jpg"));

        let name = url.rsplit('/').next().unwrap();
        let bytes = std::fs::read(dir.path().join("uploads").join(name)).unwrap();
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding for still images

use crate::constants::files;
use crate::errors::PhotoError;
use image::{ImageFormat, RgbImage};
use std::path::Path;
use tracing::debug;

/// Encodes RGB frames to JPEG
#[derive(Debug, Clone)]
pub struct PhotoEncoder {
    quality: u8,
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoEncoder {
    /// Encoder with the default still quality (95)
    pub fn new() -> Self {
        Self {
            quality: files::JPEG_QUALITY,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode image as JPEG
    pub fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, PhotoError> {
        let mut buffer = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, self.quality);

        encoder.encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        debug!(size = buffer.len(), quality = self.quality, "JPEG encoding complete");
        Ok(buffer)
    }

    /// Write encoded data to `path`
    pub fn write(&self, data: &[u8], path: &Path) -> Result<(), PhotoError> {
        std::fs::write(path, data)
            .map_err(|e| PhotoError::SaveFailed(format!("{}: {}", path.display(), e)))
    }

    /// Save to `path` in the format named by its extension
    ///
    /// `.jpg`/`.jpeg` use this encoder's quality. Other formats the image
    /// crate can write (`.png`, `.bmp`, ...) are written as that format.
    pub fn save_as(&self, image: &RgbImage, path: &Path) -> Result<(), PhotoError> {
        let format = ImageFormat::from_path(path).map_err(|_| {
            PhotoError::SaveFailed(format!("{}: unknown image file extension", path.display()))
        })?;

        match format {
            ImageFormat::Jpeg => {
                let data = self.encode_jpeg(image)?;
                self.write(&data, path)
            }
            format if format.writing_enabled() => image
                .save_with_format(path, format)
                .map_err(|e| PhotoError::SaveFailed(format!("{}: {}", path.display(), e))),
            format => Err(PhotoError::SaveFailed(format!(
                "{}: cannot write {:?} images",
                path.display(),
                format
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_signature() {
        let image = RgbImage::from_pixel(16, 8, image::Rgb([200, 40, 40]));
        let data = PhotoEncoder::new().encode_jpeg(&image).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_save_as_follows_extension() {
        let dir = std::env::temp_dir().join(format!("rpi-camera-photo-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image = RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 30]));
        let encoder = PhotoEncoder::new();
        assert_eq!(encoder.quality(), 95);

        let png = dir.join("still.png");
        encoder.save_as(&image, &png).unwrap();
        assert_eq!(&std::fs::read(&png).unwrap()[..4], b"\x89PNG");

        let jpeg = dir.join("still.JPEG");
        encoder.save_as(&image, &jpeg).unwrap();
        assert_eq!(&std::fs::read(&jpeg).unwrap()[..2], &[0xFF, 0xD8]);

        let text = dir.join("still.txt");
        assert!(encoder.save_as(&image, &text).is_err());
        assert!(!text.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Still image capture
//!
//! ```text
//! RGB frame → disk space check → JPEG encode → Image<timestamp>.jpg
//! ```

pub mod encoding;

pub use encoding::PhotoEncoder;

use crate::constants::storage::MIN_FREE_GB;
use crate::errors::PhotoError;
use crate::storage::{check_disk_space, image_filename, unique_path};
use chrono::NaiveDateTime;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Encodes and saves still images
#[derive(Debug, Clone, Default)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `image` into `output_dir` as `Image<timestamp>.jpg`
    ///
    /// A second capture within the same second gets a `_1`, `_2`, ... suffix.
    /// Low disk space only produces a warning; the write is still attempted.
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path to saved photo
    /// * `Err(PhotoError)` - Encoding or writing failed
    pub fn save(
        &self,
        image: &RgbImage,
        output_dir: &Path,
        timestamp: &NaiveDateTime,
    ) -> Result<PathBuf, PhotoError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PhotoError::NoFrameAvailable);
        }

        let space = check_disk_space(output_dir, MIN_FREE_GB);
        if !space.ok {
            warn!(
                free_gb = ?space.free_gb,
                dir = %output_dir.display(),
                "Low disk space, saving anyway"
            );
        }

        let data = self.encoder.encode_jpeg(image)?;
        let path = unique_path(output_dir, &image_filename(timestamp));
        self.encoder.write(&data, &path)?;

        info!(
            path = %path.display(),
            size_kb = format!("{:.1}", data.len() as f64 / 1024.0),
            "Image saved"
        );
        Ok(path)
    }
}

//! Builtin JPEG recompressor.
//!
//! Decodes the file and re-encodes it at the requested quality. The result
//! replaces the original only when it is smaller, like `jpegoptim -m`.
//! Other formats are left as they are.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use crate::cache::StagedFile;
use crate::error::OptimizeError;

use super::{is_jpeg, Optimizer, Quality};

/// In-process JPEG [`Optimizer`] using the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct JpegOptimizer {}

impl JpegOptimizer {
    pub fn new() -> Self {
        Self {}
    }

    /// Re-encode JPEG data at `quality`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a decodable JPEG or encoding fails.
    pub fn encode(&self, path: &Path, source: &[u8], quality: Quality) -> Result<Vec<u8>, OptimizeError> {
        let img = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg)
            .decode()
            .map_err(|e| OptimizeError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.get());

        let result = match img.color() {
            ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
                encoder.encode_image(&img.to_luma8())
            }
            _ => encoder.encode_image(&to_rgb(img)),
        };
        result.map_err(|e| OptimizeError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(output)
    }

    fn recompress(&self, path: &Path, quality: Quality) -> Result<(), OptimizeError> {
        if !is_jpeg(path) {
            debug!(path = %path.display(), "not a JPEG, skipping optimization");
            return Ok(());
        }

        let original =
            std::fs::read(path).map_err(|e| OptimizeError::Io(format!("{}: {}", path.display(), e)))?;
        let output = self.encode(path, &original, quality)?;

        if output.len() >= original.len() {
            debug!(
                path = %path.display(),
                original = original.len(),
                reencoded = output.len(),
                "re-encoded JPEG is not smaller, keeping original"
            );
            return Ok(());
        }

        let staged = StagedFile::sibling(path, "opt");
        std::fs::write(staged.path(), &output)
            .and_then(|()| staged.persist(path))
            .map_err(|e| OptimizeError::Io(format!("{}: {}", path.display(), e)))?;

        debug!(
            path = %path.display(),
            quality = quality.get(),
            original = original.len(),
            optimized = output.len(),
            "optimized JPEG"
        );
        Ok(())
    }
}

fn to_rgb(img: DynamicImage) -> image::RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

#[async_trait]
impl Optimizer for JpegOptimizer {
    async fn optimize(&self, path: &Path, quality: Quality) -> Result<(), OptimizeError> {
        let this = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || this.recompress(&path, quality))
            .await
            .map_err(|e| OptimizeError::Io(e.to_string()))?
    }
}

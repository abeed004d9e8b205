//! Image-processing backends.
//!
//! The dispatcher decides *what* to do and hands a [`Geometry`] to a
//! [`Transformer`]. The backend only reads the source file, produces the
//! output file, and reports failure. It never chooses sizes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};

use crate::error::TransformError;

use super::geometry::{
    band_region, center_offset, cover_region, fit_dimensions, scaled_height, within_pixel_limit,
    Dimensions, Region,
};

/// Quality used when the transform writes JPEG; the optimizer compresses
/// further afterwards.
pub const INTERMEDIATE_JPEG_QUALITY: u8 = 95;

/// Unsharp mask applied after downscaling: (sigma, threshold).
pub const DEFAULT_SHARPEN: (f32, i32) = (0.5, 0);

/// Largest output the backend will allocate, in pixels.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

// =============================================================================
// Geometry
// =============================================================================

/// Fully resolved geometric operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Scale to `width` keeping aspect, then center-crop vertically to
    /// `max_height` if the scaled image is taller.
    ResizeToWidth { width: u32, max_height: Option<u32> },

    /// Scale to cover the box, then center-crop to exactly the box.
    Cover { width: u32, height: u32 },

    /// Scale to fit inside the box and pad to exactly the box.
    Contain {
        width: u32,
        height: u32,
        background: [u8; 4],
    },
}

// =============================================================================
// Transformer Trait
// =============================================================================

/// Image-processing capability: source file + geometry -> output file.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait Transformer: Send + Sync {
    /// Read the source dimensions from its header, without decoding pixels.
    fn identify(&self, source: &Path) -> Result<Dimensions, TransformError>;

    /// Write the transformed image to `dest`.
    ///
    /// The output format follows the extension of `dest`.
    fn apply(&self, source: &Path, dest: &Path, geometry: &Geometry)
        -> Result<(), TransformError>;
}

// =============================================================================
// image-rs Backend
// =============================================================================

/// [`Transformer`] implemented with the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    filter: FilterType,
    sharpen: Option<(f32, i32)>,
    jpeg_quality: u8,
}

impl Default for ImageTransformer {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            sharpen: Some(DEFAULT_SHARPEN),
            jpeg_quality: INTERMEDIATE_JPEG_QUALITY,
        }
    }
}

impl ImageTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable or change the post-resize unsharp mask.
    pub fn with_sharpen(mut self, sharpen: Option<(f32, i32)>) -> Self {
        self.sharpen = sharpen;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    fn sharpened(&self, img: DynamicImage) -> DynamicImage {
        match self.sharpen {
            Some((sigma, threshold)) => img.unsharpen(sigma, threshold),
            None => img,
        }
    }

    /// Crop `region` out of `img`, then scale it to exactly `target`.
    ///
    /// Cropping first keeps memory bounded by the source and the output.
    fn crop_then_resize(&self, img: DynamicImage, region: Region, target: Dimensions) -> DynamicImage {
        let cropped = if region.dimensions() == Dimensions::new(img.width(), img.height()) {
            img
        } else {
            img.crop_imm(region.x, region.y, region.width, region.height)
        };

        cropped.resize_exact(target.width, target.height, self.filter)
    }

    fn resize_to_width(
        &self,
        img: DynamicImage,
        width: u32,
        max_height: Option<u32>,
    ) -> Result<DynamicImage, TransformError> {
        let source = Dimensions::new(img.width(), img.height());

        let band = max_height.and_then(|max| band_region(source, width, max).map(|r| (r, max)));

        let (region, target) = match band {
            Some((region, max)) => (region, Dimensions::new(width, max)),
            None => (
                Region::new(0, 0, source.width, source.height),
                Dimensions::new(width, scaled_height(source, width)),
            ),
        };
        check_pixel_limit(target)?;

        Ok(self.sharpened(self.crop_then_resize(img, region, target)))
    }

    fn cover(&self, img: DynamicImage, target: Dimensions) -> Result<DynamicImage, TransformError> {
        check_pixel_limit(target)?;

        let source = Dimensions::new(img.width(), img.height());
        let region = cover_region(source, target);

        Ok(self.sharpened(self.crop_then_resize(img, region, target)))
    }

    fn contain(
        &self,
        img: DynamicImage,
        target: Dimensions,
        background: [u8; 4],
    ) -> Result<DynamicImage, TransformError> {
        check_pixel_limit(target)?;

        let source = Dimensions::new(img.width(), img.height());
        let fit = fit_dimensions(source, target);
        let resized = self.sharpened(img.resize_exact(fit.width, fit.height, self.filter));

        let mut canvas = RgbaImage::from_pixel(target.width, target.height, Rgba(background));
        imageops::overlay(
            &mut canvas,
            &resized.to_rgba8(),
            center_offset(target.width, fit.width) as i64,
            center_offset(target.height, fit.height) as i64,
        );

        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn save(&self, img: &DynamicImage, dest: &Path) -> Result<(), TransformError> {
        let encode_err = |message: String| TransformError::Encode {
            path: dest.to_path_buf(),
            message,
        };

        let format = ImageFormat::from_path(dest).map_err(|e| encode_err(e.to_string()))?;
        let file = File::create(dest).map_err(|e| encode_err(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        match format {
            ImageFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
                encoder
                    .encode_image(&img.to_rgb8())
                    .map_err(|e| encode_err(e.to_string()))?;
            }
            ImageFormat::WebP => {
                // The WebP encoder only takes 8-bit RGB(A)
                DynamicImage::ImageRgba8(img.to_rgba8())
                    .write_to(&mut writer, ImageFormat::WebP)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
            other => {
                img.write_to(&mut writer, other)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
        }

        writer.flush().map_err(|e| encode_err(e.to_string()))
    }
}

fn check_pixel_limit(target: Dimensions) -> Result<(), TransformError> {
    if within_pixel_limit(target, MAX_OUTPUT_PIXELS) {
        Ok(())
    } else {
        Err(TransformError::OutputTooLarge {
            width: target.width,
            height: target.height,
        })
    }
}

fn decode(source: &Path) -> Result<DynamicImage, TransformError> {
    let decode_err = |message: String| TransformError::Decode {
        path: source.to_path_buf(),
        message,
    };

    ImageReader::open(source)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))
}

impl Transformer for ImageTransformer {
    fn identify(&self, source: &Path) -> Result<Dimensions, TransformError> {
        let (width, height) = ImageReader::open(source)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| TransformError::Decode {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?
            .into_dimensions()
            .map_err(|e| TransformError::Decode {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Dimensions::new(width, height))
    }

    fn apply(
        &self,
        source: &Path,
        dest: &Path,
        geometry: &Geometry,
    ) -> Result<(), TransformError> {
        let img = decode(source)?;

        let output = match *geometry {
            Geometry::ResizeToWidth { width, max_height } => {
                self.resize_to_width(img, width, max_height)?
            }
            Geometry::Cover { width, height } => self.cover(img, Dimensions::new(width, height))?,
            Geometry::Contain {
                width,
                height,
                background,
            } => self.contain(img, Dimensions::new(width, height), background)?,
        };

        self.save(&output, dest)
    }
}

//! Geometric transforms.
//!
//! # Operations
//!
//! | Operation         | Geometry                                         |
//! |-------------------|--------------------------------------------------|
//! | `ResizeToWidth`   | scale to width, center-crop to height if taller  |
//! | `CropToFit`       | cover the box, center-crop to exactly the box    |
//! | `ThumbnailAspect` | 16:9 box; cover if the source is wider, else pad |
//!
//! [`TransformDispatcher`] resolves the operation into a [`Geometry`] and
//! checks preconditions. The pixel work is done by a [`Transformer`];
//! [`ImageTransformer`] is the `image`-crate implementation.

mod backend;
mod dispatcher;
mod geometry;

pub use backend::{
    Geometry, ImageTransformer, Transformer, DEFAULT_SHARPEN, INTERMEDIATE_JPEG_QUALITY,
    MAX_OUTPUT_PIXELS,
};
pub use dispatcher::{TransformDispatcher, DEFAULT_BACKGROUND};
pub use geometry::{
    band_region, center_offset, cover_region, fit_dimensions, is_wider, scaled_height,
    within_pixel_limit, AspectRatio, Dimensions, Region,
};

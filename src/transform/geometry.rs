//! Pure dimension calculations.
//!
//! Nothing here touches pixels or files.

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Target aspect ratio for aspect thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const SIXTEEN_NINE: AspectRatio = AspectRatio::new(16, 9);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Box for the given dimensions, computing the missing side.
    ///
    /// When both sides are given the width wins and the height is derived
    /// from it, so the box always has this ratio. Returns `None` when neither
    /// side is given.
    ///
    /// ```
    /// use variant_cache::transform::{AspectRatio, Dimensions};
    ///
    /// let ratio = AspectRatio::SIXTEEN_NINE;
    /// assert_eq!(ratio.box_for(Some(320), None), Some(Dimensions::new(320, 180)));
    /// assert_eq!(ratio.box_for(None, Some(200)), Some(Dimensions::new(356, 200)));
    /// assert_eq!(ratio.box_for(None, None), None);
    /// ```
    pub fn box_for(&self, width: Option<u32>, height: Option<u32>) -> Option<Dimensions> {
        match (width, height) {
            (Some(w), _) => Some(Dimensions::new(w, scale(w, self.height, self.width))),
            (None, Some(h)) => Some(Dimensions::new(scale(h, self.width, self.height), h)),
            (None, None) => None,
        }
    }
}

/// `round(value * num / den)`, at least 1.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    let scaled = (value as f64 * num as f64 / den as f64).round();
    (scaled as u32).max(1)
}

/// Height after scaling `source` to `width`, preserving aspect ratio.
pub fn scaled_height(source: Dimensions, width: u32) -> u32 {
    scale(source.height, width, source.width.max(1))
}

/// Whether `source` is wider than the aspect of `target`.
pub fn is_wider(source: Dimensions, target: Dimensions) -> bool {
    (source.width as u64) * (target.height as u64) > (source.height as u64) * (target.width as u64)
}

/// Rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Centered part of `source` with the aspect ratio of `target`.
///
/// Cropping to this region and scaling it to `target` gives the same image
/// as scaling to cover and cropping afterwards, without ever holding the
/// oversized intermediate.
pub fn cover_region(source: Dimensions, target: Dimensions) -> Region {
    if is_wider(source, target) {
        let width = scale(source.height, target.width, target.height.max(1)).min(source.width);
        Region::new(center_offset(source.width, width), 0, width, source.height)
    } else {
        let height = scale(source.width, target.height, target.width.max(1)).min(source.height);
        Region::new(0, center_offset(source.height, height), source.width, height)
    }
}

/// Centered horizontal band of `source` that becomes `max_height` rows once
/// scaled to `width`, or `None` when the scaled image is not taller.
pub fn band_region(source: Dimensions, width: u32, max_height: u32) -> Option<Region> {
    if scaled_height(source, width) <= max_height {
        return None;
    }

    let rows = scale(max_height, source.width, width.max(1)).min(source.height);
    Some(Region::new(
        0,
        center_offset(source.height, rows),
        source.width,
        rows,
    ))
}

/// Whether an output of `dims` stays within `max_pixels`.
pub fn within_pixel_limit(dims: Dimensions, max_pixels: u64) -> bool {
    (dims.width as u64) * (dims.height as u64) <= max_pixels
}

/// Dimensions that fit inside `target` while keeping the source aspect ratio.
///
/// One side matches the target exactly, the other is equal or smaller.
pub fn fit_dimensions(source: Dimensions, target: Dimensions) -> Dimensions {
    if is_wider(source, target) {
        let height = scale(target.width, source.height, source.width.max(1));
        Dimensions::new(target.width, height.min(target.height))
    } else {
        let width = scale(target.height, source.width, source.height.max(1));
        Dimensions::new(width.min(target.width), target.height)
    }
}

/// Offset that centers `inner` inside `outer`.
pub fn center_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

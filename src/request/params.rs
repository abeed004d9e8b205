//! Transform parameter parsing and clamping.
//!
//! Query parameters never fail a request. A value that does not parse, or
//! that falls outside its bounds, is dropped and the default applies.

use url::form_urlencoded;

/// Largest accepted target width in pixels.
pub const MAX_WIDTH: u32 = 2048;

/// Largest accepted target height in pixels.
pub const MAX_HEIGHT: u32 = 1024;

/// Lowest accepted lossy quality.
pub const MIN_QUALITY: u8 = 60;

/// Highest accepted lossy quality.
pub const MAX_QUALITY: u8 = 100;

// =============================================================================
// Operation
// =============================================================================

/// Geometric operation requested for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Serve the origin unchanged (post-compression still applies)
    None,

    /// `r2w`: scale to a width, optionally center-cropped to a max height
    ResizeToWidth,

    /// `c2f`: cover a width×height box and center-crop to it
    CropToFit,

    /// `t16x9`: fixed aspect box, cover or pad depending on the source shape
    ThumbnailAspect,
}

impl Operation {
    /// Short name used in the `op` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::None => "none",
            Operation::ResizeToWidth => "r2w",
            Operation::CropToFit => "c2f",
            Operation::ThumbnailAspect => "t16x9",
        }
    }

    /// Parse an `op` value. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "none" => Some(Operation::None),
            "r2w" => Some(Operation::ResizeToWidth),
            "c2f" => Some(Operation::CropToFit),
            "t16x9" => Some(Operation::ThumbnailAspect),
            _ => None,
        }
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Transform parameters after parsing and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub op: Option<Operation>,
    pub quality: Option<u8>,
}

impl QueryParams {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Recognised keys: `width`/`w`, `height`/`h`, `op`, `quality`/`q`.
    /// The long name wins over the short one, and the first occurrence of a
    /// key wins over later ones.
    pub fn parse(raw: &str) -> Self {
        let mut width = None;
        let mut w = None;
        let mut height = None;
        let mut h = None;
        let mut op = None;
        let mut quality = None;
        let mut q = None;

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let slot = match &*key {
                "width" => &mut width,
                "w" => &mut w,
                "height" => &mut height,
                "h" => &mut h,
                "op" => &mut op,
                "quality" => &mut quality,
                "q" => &mut q,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        Self {
            width: width.or(w).as_deref().and_then(|v| parse_dimension(v, MAX_WIDTH)),
            height: height.or(h).as_deref().and_then(|v| parse_dimension(v, MAX_HEIGHT)),
            op: op.as_deref().and_then(Operation::parse),
            quality: quality.or(q).as_deref().and_then(parse_quality),
        }
    }

    /// Resolve the effective operation.
    ///
    /// `c2f` and `t16x9` are taken as given. Anything else resizes to width
    /// when a width is present and leaves the image alone otherwise.
    pub fn operation(&self) -> Operation {
        match self.op {
            Some(Operation::CropToFit) => Operation::CropToFit,
            Some(Operation::ThumbnailAspect) => Operation::ThumbnailAspect,
            _ if self.width.is_some() => Operation::ResizeToWidth,
            _ => Operation::None,
        }
    }
}

/// Parse a pixel dimension; zero, garbage and values above `max` are unset.
fn parse_dimension(value: &str, max: u32) -> Option<u32> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|v| *v > 0 && *v <= max)
}

/// Parse a quality; anything outside [60, 100] is unset.
fn parse_quality(value: &str) -> Option<u8> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|q| (MIN_QUALITY..=MAX_QUALITY).contains(q))
}

// =============================================================================
// Tests
// =============================================================================

//! Request normalization.
//!
//! Turns a raw request path and query string into an immutable
//! [`ImageRequest`]: the extension is checked against the allow-list, the
//! transform parameters are parsed and clamped, and the [`CachePath`] is
//! derived.
//!
//! # Example
//!
//! ```
//! use variant_cache::request::{Operation, RequestNormalizer};
//!
//! let normalizer = RequestNormalizer::new(["jpg", "png"]);
//! let request = normalizer
//!     .normalize("/photos/cat.jpg", Some("width=320&op=c2f&height=180"))
//!     .unwrap();
//!
//! assert_eq!(request.source_path(), "/photos/cat.jpg");
//! assert_eq!(request.operation(), Operation::CropToFit);
//! assert_eq!(request.cache_path().to_string(), "photos/op_c2f_w_320_h_180.cat.jpg");
//!
//! assert!(normalizer.normalize("/anim.gif", None).is_err());
//! ```

mod cache_path;
mod params;

use std::collections::HashSet;
use std::path::Path;

use crate::error::ValidationError;

pub use cache_path::{CachePath, MAX_QUERY_LEN};
pub use params::{Operation, QueryParams, MAX_HEIGHT, MAX_QUALITY, MAX_WIDTH, MIN_QUALITY};

/// Default extension allow-list.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

// =============================================================================
// Transform Spec
// =============================================================================

/// Resolved transform tuple after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSpec {
    pub operation: Operation,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
}

impl TransformSpec {
    /// Build a spec directly, bypassing query parsing.
    pub fn new(operation: Operation, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            operation,
            width,
            height,
            quality: None,
        }
    }

    /// Set the requested quality.
    pub fn with_quality(mut self, quality: Option<u8>) -> Self {
        self.quality = quality;
        self
    }

    /// Canonical query for this spec: `op`, `w`, `h`, `q` in that order,
    /// each only when set.
    ///
    /// `op` is written only for crop-to-fit and aspect thumbnails; resize to
    /// width and passthrough are told apart by the presence of `w`, so two
    /// normalized specs serialize equally exactly when they are equal.
    ///
    /// ```
    /// use variant_cache::request::{Operation, TransformSpec};
    ///
    /// let spec = TransformSpec::new(Operation::CropToFit, Some(120), Some(90));
    /// assert_eq!(spec.canonical_query(), "op=c2f&w=120&h=90");
    ///
    /// let spec = TransformSpec::new(Operation::ResizeToWidth, Some(400), None).with_quality(Some(75));
    /// assert_eq!(spec.canonical_query(), "w=400&q=75");
    ///
    /// assert_eq!(TransformSpec::new(Operation::None, None, None).canonical_query(), "");
    /// ```
    pub fn canonical_query(&self) -> String {
        let op = match self.operation {
            Operation::CropToFit | Operation::ThumbnailAspect => Some(self.operation.as_str()),
            Operation::ResizeToWidth | Operation::None => None,
        };

        let mut pairs = Vec::with_capacity(4);
        if let Some(op) = op {
            pairs.push(format!("op={}", op));
        }
        if let Some(width) = self.width {
            pairs.push(format!("w={}", width));
        }
        if let Some(height) = self.height {
            pairs.push(format!("h={}", height));
        }
        if let Some(quality) = self.quality {
            pairs.push(format!("q={}", quality));
        }
        pairs.join("&")
    }
}

// =============================================================================
// Image Request
// =============================================================================

/// A normalized inbound request. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    source_path: String,
    spec: TransformSpec,
    cache_path: CachePath,
}

impl ImageRequest {
    /// Cleaned absolute request path, used to address the origin.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn operation(&self) -> Operation {
        self.spec.operation
    }

    pub fn width(&self) -> Option<u32> {
        self.spec.width
    }

    pub fn height(&self) -> Option<u32> {
        self.spec.height
    }

    pub fn quality(&self) -> Option<u8> {
        self.spec.quality
    }

    /// The resolved transform parameters.
    pub fn transform_spec(&self) -> TransformSpec {
        self.spec
    }

    /// Where the variant lives under the cache root.
    pub fn cache_path(&self) -> &CachePath {
        &self.cache_path
    }

    /// Full origin URL for this request.
    pub fn origin_url(&self, upstream: &str) -> String {
        format!("{}{}", upstream.trim_end_matches('/'), self.source_path)
    }

    /// MIME type derived from the file extension.
    pub fn content_type(&self) -> &'static str {
        content_type_for(Path::new(&self.source_path))
    }
}

// =============================================================================
// Request Normalizer
// =============================================================================

/// Validates and normalizes inbound image requests.
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    allowed_extensions: HashSet<String>,
}

impl RequestNormalizer {
    /// Create a normalizer accepting the given extensions.
    ///
    /// Extensions are matched case-insensitively; a leading dot and
    /// surrounding whitespace are ignored, blank entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self { allowed_extensions }
    }

    /// Whether a path carries an allowed extension.
    pub fn is_allowed(&self, path: &str) -> bool {
        extension_of(path).is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// Normalize a raw request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedMedia`] when the extension is
    /// missing or not allowed. Nothing else fails: bad parameters degrade to
    /// defaults.
    ///
    /// The cache path is derived from the cleaned path and the canonical
    /// query of the resolved spec, never from the raw request.
    pub fn normalize(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<ImageRequest, ValidationError> {
        if !self.is_allowed(path) {
            return Err(ValidationError::UnsupportedMedia {
                path: path.to_string(),
                extension: extension_of(path),
            });
        }

        let params = QueryParams::parse(query.unwrap_or(""));
        let spec = TransformSpec {
            operation: params.operation(),
            width: params.width,
            height: params.height,
            quality: params.quality,
        };

        let source_path = clean_path(path);
        let cache_path = CachePath::derive(&source_path, Some(&spec.canonical_query()));

        Ok(ImageRequest {
            source_path,
            spec,
            cache_path,
        })
    }
}

impl Default for RequestNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Lowercased extension of the last path segment, if any.
fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Lexically clean a URL path: collapse empty and `.` segments and resolve
/// `..` without ever climbing above the root.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// MIME type for a file based on its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Tests
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Request validation errors.
///
/// Unparseable transform parameters never end up here: they degrade to
/// defaults. Only the file extension is hard-rejected.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Extension is missing or not in the allow-list (should map to HTTP 404)
    #[error("Unsupported media type for {path}: {}", extension.as_deref().unwrap_or("<none>"))]
    UnsupportedMedia {
        path: String,
        extension: Option<String>,
    },
}

/// Errors that can occur while fetching an origin image
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Another request is already fetching this URL
    #[error("Already fetching: {url}")]
    AlreadyFetching { url: String },

    /// Upstream answered with something other than 200
    #[error("Upstream returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Upstream answered 200 with no content
    #[error("Upstream returned an empty body for {url}")]
    EmptyBody { url: String },

    /// Upstream body exceeds the configured size limit
    #[error("Upstream body for {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Local filesystem error while writing the download
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from the transform dispatcher and its backends
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source path is not an existing file
    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Destination directory does not exist
    #[error("Destination directory missing: {}", path.display())]
    DestinationMissing { path: PathBuf },

    /// A required dimension is absent for the operation
    #[error("{operation} requires a {dimension}")]
    MissingDimension {
        operation: &'static str,
        dimension: &'static str,
    },

    /// Neither width nor height was given for an aspect thumbnail
    #[error("Aspect thumbnail requires a width or a height")]
    InsufficientParams,

    /// The transform carries no operation to apply
    #[error("No transform operation requested")]
    NoOperation,

    /// Source image could not be read or decoded
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// Requested output exceeds the pixel budget
    #[error("Output of {width}x{height} exceeds the pixel limit")]
    OutputTooLarge { width: u32, height: u32 },

    /// Output image could not be encoded or written
    #[error("Failed to encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from the post-compression step
#[derive(Debug, Clone, Error)]
pub enum OptimizeError {
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Failed to encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    /// External optimizer exited unsuccessfully or could not be spawned
    #[error("{program} failed: {message}")]
    CommandFailed {
        program: &'static str,
        message: String,
    },
}

/// Cache store errors
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the variant pipeline
#[derive(Debug, Clone, Error)]
pub enum VariantError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

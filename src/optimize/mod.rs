//! Post-compression of produced artifacts.
//!
//! Every optimizer works in place: it is handed the path of a staged file
//! and either rewrites it (atomically) or leaves it untouched. What happens
//! when it fails is decided by the caller through [`OptimizeFailurePolicy`].

mod command;
mod jpeg;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::OptimizeError;
use crate::request::{MAX_QUALITY, MIN_QUALITY};

pub use command::JpegoptimOptimizer;
pub use jpeg::JpegOptimizer;

/// Quality applied when none (or an out-of-range one) was requested.
pub const DEFAULT_QUALITY: u8 = 90;

// =============================================================================
// Quality
// =============================================================================

/// Lossy compression quality, always within the accepted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    /// Returns `None` outside the accepted range.
    pub fn new(value: u8) -> Option<Self> {
        (MIN_QUALITY..=MAX_QUALITY)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Requested quality, or the default when absent or out of range.
    ///
    /// ```
    /// use variant_cache::optimize::Quality;
    ///
    /// assert_eq!(Quality::resolve(Some(75)).get(), 75);
    /// assert_eq!(Quality::resolve(Some(45)).get(), 90);
    /// assert_eq!(Quality::resolve(Some(150)).get(), 90);
    /// assert_eq!(Quality::resolve(None).get(), 90);
    /// ```
    pub fn resolve(requested: Option<u8>) -> Self {
        requested.and_then(Self::new).unwrap_or_default()
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Optimizer Trait
// =============================================================================

/// Lossy recompression capability.
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Recompress the file at `path` in place.
    ///
    /// On error the file at `path` is still the valid, unoptimized image.
    async fn optimize(&self, path: &Path, quality: Quality) -> Result<(), OptimizeError>;
}

/// Optimizer that leaves files untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOptimizer;

#[async_trait]
impl Optimizer for NoopOptimizer {
    async fn optimize(&self, _path: &Path, _quality: Quality) -> Result<(), OptimizeError> {
        Ok(())
    }
}

// =============================================================================
// Failure Policy
// =============================================================================

/// What to do when the optimizer fails on a valid artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OptimizeFailurePolicy {
    /// Publish the unoptimized artifact and log a warning.
    #[default]
    Tolerate,

    /// Fail the request and publish nothing.
    Fail,
}

pub(crate) fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

//! Variant cache on the local filesystem.
//!
//! # Components
//!
//! - [`CacheStore`]: lookup by [`CachePath`](crate::request::CachePath), atomic publish
//! - [`CacheArtifact`]: a published file and its provenance timestamp
//! - [`StagedFile`]: temp file guard that cleans up on every exit path

mod staging;
mod store;

pub(crate) use staging::{set_modified, set_modified_blocking};
pub use staging::StagedFile;
pub use store::{CacheArtifact, CacheStore, CachedVariant};

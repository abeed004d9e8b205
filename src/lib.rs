//! # Variant Cache
//!
//! An HTTP service that serves image variants (resized, cropped, aspect
//! thumbnails) computed on demand from origin images, caching every variant
//! on disk so repeated requests are served without recomputation.
//!
//! ## Features
//!
//! - **Deterministic cache paths**: the request path and its parameters map
//!   to one traversal-safe file under the cache root
//! - **Single-flight origin fetch**: concurrent fetches of the same origin are
//!   rejected fast instead of duplicated
//! - **Atomic publish**: variants appear at their cache path fully written or
//!   not at all, with the origin's timestamp preserved
//! - **Pluggable backends**: transforms and compression sit behind traits
//!
//! ## Architecture
//!
//! - [`request`] - Parameter parsing, clamping and cache path derivation
//! - [`cache`] - Filesystem cache store and staged files
//! - [`origin`] - Upstream client and single-flight fetcher
//! - [`transform`] - Geometry planning and the `image` backend
//! - [`optimize`] - Post-compression
//! - [`variant`] - The pipeline tying it all together
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use variant_cache::{create_router, HttpOrigin, RouterConfig, VariantConfig, VariantService};
//! use variant_cache::origin::DEFAULT_FETCH_TIMEOUT;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let origin = HttpOrigin::new(DEFAULT_FETCH_TIMEOUT)?;
//!     let config = VariantConfig::new("/var/cache/variants", "https://origin.example.com");
//!     let service = VariantService::new(config, origin);
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod optimize;
pub mod origin;
pub mod request;
pub mod server;
pub mod transform;
pub mod variant;

// Re-export commonly used types
pub use cache::{CacheArtifact, CacheStore, CachedVariant, StagedFile};
pub use config::{Config, OptimizerKind};
pub use error::{
    CacheError, FetchError, OptimizeError, TransformError, ValidationError, VariantError,
};
pub use optimize::{
    JpegOptimizer, JpegoptimOptimizer, NoopOptimizer, OptimizeFailurePolicy, Optimizer, Quality,
    DEFAULT_QUALITY,
};
pub use origin::{
    HttpOrigin, InFlightGuard, InFlightRegistry, OriginBody, OriginClient, OriginFetcher,
    OriginResponse,
};
pub use request::{CachePath, ImageRequest, Operation, RequestNormalizer, TransformSpec};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use transform::{Geometry, ImageTransformer, TransformDispatcher, Transformer};
pub use variant::{VariantConfig, VariantResponse, VariantService};

//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                 - Health check
//! [prefix]/{*path}        - Image variant (e.g. /images/photos/cat.jpg?w=320)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use variant_cache::origin::{HttpOrigin, DEFAULT_FETCH_TIMEOUT};
//! use variant_cache::server::{create_router, RouterConfig};
//! use variant_cache::variant::{VariantConfig, VariantService};
//!
//! let origin = HttpOrigin::new(DEFAULT_FETCH_TIMEOUT)?;
//! let service = VariantService::new(
//!     VariantConfig::new("/var/cache/variants", "https://origin.example.com"),
//!     origin,
//! );
//!
//! let router = create_router(service, RouterConfig::new().with_prefix("/images"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, variant_handler, AppState, DEFAULT_CACHE_MAX_AGE};
use crate::origin::OriginClient;
use crate::variant::VariantService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Path prefix for variant routes (None = served from the root)
    pub prefix: Option<String>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    /// Defaults: no prefix, any CORS origin, one day max-age, tracing on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve variants under `prefix`. A trailing slash is ignored and an
    /// empty prefix (or `/`) means no prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        self.prefix = if trimmed.is_empty() {
            None
        } else if trimmed.starts_with('/') {
            Some(trimmed.to_string())
        } else {
            Some(format!("/{}", trimmed))
        };
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// An empty vec disallows all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// # Arguments
///
/// * `service` - The variant pipeline
/// * `config` - Router configuration
pub fn create_router<C>(service: VariantService<C>, config: RouterConfig) -> Router
where
    C: OriginClient + 'static,
{
    let app_state = AppState::with_cache_max_age(service, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let variant_routes = Router::new()
        .route("/{*path}", get(variant_handler::<C>))
        .with_state(app_state);

    let public_routes = Router::new().route("/health", get(health_handler));

    let router = match &config.prefix {
        Some(prefix) => public_routes.nest(prefix, variant_routes),
        None => public_routes.merge(variant_routes),
    }
    .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! HTTP request handlers for the variant API.
//!
//! # Endpoints
//!
//! - `GET [prefix]/{*path}` - Serve an image variant
//! - `GET /health` - Health check endpoint

use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{FetchError, TransformError, VariantError};
use crate::origin::OriginClient;
use crate::variant::VariantService;

/// Response header reporting whether the variant came from cache.
pub const X_CACHE_HIT: HeaderName = HeaderName::from_static("x-cache-hit");

/// Default `Cache-Control` max-age (one day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86_400;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the variant service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<C: OriginClient> {
    /// The pipeline serving variant requests
    pub service: Arc<VariantService<C>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl<C: OriginClient> AppState<C> {
    pub fn new(service: VariantService<C>) -> Self {
        Self::with_cache_max_age(service, DEFAULT_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(service: VariantService<C>, cache_max_age: u32) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age,
        }
    }
}

impl<C: OriginClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "fetch_failed")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl VariantError {
    /// HTTP status and error type identifier for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            VariantError::Validation(_) => (StatusCode::NOT_FOUND, "unsupported_media"),

            VariantError::Fetch(FetchError::Status { status: 404, .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            VariantError::Fetch(FetchError::AlreadyFetching { .. }) => {
                (StatusCode::BAD_GATEWAY, "already_fetching")
            }
            VariantError::Fetch(_) => (StatusCode::BAD_GATEWAY, "fetch_failed"),

            VariantError::Transform(TransformError::SourceNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            VariantError::Transform(_) => (StatusCode::BAD_GATEWAY, "transform_failed"),

            VariantError::Optimize(_) => (StatusCode::BAD_GATEWAY, "optimize_failed"),

            VariantError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
        }
    }
}

/// Convert VariantError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404s at DEBUG, other 4xx at WARN.
impl IntoResponse for VariantError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else if status.is_client_error() {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image variant requests.
///
/// # Endpoint
///
/// `GET [prefix]/{*path}`
///
/// # Query Parameters
///
/// - `width` / `w`: target width (1-2048)
/// - `height` / `h`: target height (1-1024)
/// - `op`: `r2w`, `c2f`, `t16x9` or `none`
/// - `quality` / `q`: compression quality (60-100, default: 90)
///
/// Out-of-range or unparseable values are ignored.
///
/// # Response
///
/// - `200 OK`: image bytes
/// - `404 Not Found`: extension not allowed, or origin not found
/// - `502 Bad Gateway`: fetch, transform or optimization failure, or the
///   origin is being fetched by another request (retry)
/// - `500 Internal Server Error`: cache I/O failure
///
/// # Headers
///
/// - `Content-Type` from the file extension
/// - `Last-Modified` from the stored artifact timestamp
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache-Hit: true|false`
pub async fn variant_handler<C: OriginClient>(
    State(state): State<AppState<C>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, VariantError> {
    let path = format!("/{}", path.trim_start_matches('/'));

    let response = state.service.serve(&path, query.as_deref()).await?;

    let headers = [
        (header::CONTENT_TYPE, response.content_type.to_string()),
        (header::LAST_MODIFIED, format_http_date(response.last_modified)),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (X_CACHE_HIT, response.cache_hit.to_string()),
    ];

    Ok((StatusCode::OK, headers, Body::from(response.data)).into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Format a timestamp as an HTTP date (IMF-fixdate).
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================

//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │            GET [prefix]/{*path}?w=..&h=..&op=..&q=..            │
//! │                                                                 │
//! │  ┌───────────────────────────┐  ┌────────────────────────────┐  │
//! │  │         handlers          │  │          routes            │  │
//! │  │ (requests, error mapping) │  │ (prefix, CORS, tracing)    │  │
//! │  └───────────────────────────┘  └────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    format_http_date, health_handler, variant_handler, AppState, ErrorResponse, HealthResponse,
    DEFAULT_CACHE_MAX_AGE, X_CACHE_HIT,
};
pub use routes::{create_router, RouterConfig};

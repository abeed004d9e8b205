//! The request-to-cache pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         VariantService                           │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                      get_variant()                         │  │
//! │  │  1. Cache lookup (hit -> serve)   4. Optimize              │  │
//! │  │  2. Fetch origin                  5. Publish (rename)      │  │
//! │  │  3. Transform                     6. Serve                 │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │        │               │                 │               │       │
//! │        ▼               ▼                 ▼               ▼       │
//! │  ┌──────────┐  ┌───────────────┐  ┌────────────┐  ┌───────────┐  │
//! │  │CacheStore│  │ OriginFetcher │  │ Dispatcher │  │ Optimizer │  │
//! │  └──────────┘  └───────────────┘  └────────────┘  └───────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps within one request are strictly sequential. Concurrent requests
//! for the same variant are not deduplicated beyond the origin fetch; the
//! final publish is an idempotent rename.

mod service;

pub use service::{VariantConfig, VariantResponse, VariantService};

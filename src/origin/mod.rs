//! Origin fetching.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             OriginFetcher               │
//! │  ┌──────────────────┐  ┌─────────────┐  │
//! │  │ InFlightRegistry │  │ StagedFile  │  │
//! │  │ (single-flight)  │  │ (temp+move) │  │
//! │  └──────────────────┘  └─────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   OriginClient (HttpOrigin / mocks)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Concurrent fetches of the same URL are rejected, not joined: the second
//! caller gets [`FetchError::AlreadyFetching`](crate::error::FetchError)
//! immediately and has to retry.

mod client;
mod fetcher;
mod inflight;

pub use client::{HttpOrigin, OriginBody, OriginClient, OriginResponse, DEFAULT_FETCH_TIMEOUT};
pub use fetcher::{parse_http_date, FetchedOrigin, OriginFetcher, DEFAULT_MAX_ORIGIN_BYTES};
pub use inflight::{InFlightGuard, InFlightRegistry};

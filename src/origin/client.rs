//! Upstream origin access.
//!
//! The fetcher only needs a status, a couple of headers and a body it can
//! pull chunk by chunk. [`OriginClient`] captures exactly that, so the
//! pipeline can run against an in-memory origin in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, LAST_MODIFIED};

use crate::error::FetchError;

// =============================================================================
// Traits
// =============================================================================

/// A streaming response body.
#[async_trait]
pub trait OriginBody: Send {
    /// Next chunk of the body, or `None` at the end.
    async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError>;
}

/// Response head plus streaming body.
pub struct OriginResponse {
    /// HTTP status code
    pub status: u16,

    /// Declared `Content-Length`, if any
    pub content_length: Option<u64>,

    /// Raw `Last-Modified` header value, if any
    pub last_modified: Option<String>,

    pub body: Box<dyn OriginBody>,
}

impl std::fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// Issues GET requests against the origin.
#[async_trait]
pub trait OriginClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<OriginResponse, FetchError>;
}

// =============================================================================
// HTTP Origin
// =============================================================================

/// Default upstream request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// [`OriginClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("variant-cache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

struct HttpBody(reqwest::Response);

#[async_trait]
impl OriginBody for HttpBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.0
            .chunk()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))
    }
}

#[async_trait]
impl OriginClient for HttpOrigin {
    async fn get(&self, url: &str) -> Result<OriginResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(OriginResponse {
            status: response.status().as_u16(),
            content_length,
            last_modified,
            body: Box::new(HttpBody(response)),
        })
    }
}

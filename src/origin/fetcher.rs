//! Origin fetcher with fail-fast single-flight.
//!
//! ```text
//!   try_acquire(url) ──none──▶ AlreadyFetching
//!        │
//!        ▼
//!   GET url ──non-200 / empty──▶ FetchError
//!        │
//!        ▼
//!   stream body ─▶ .fetch-<pid>-<n>.<name>   (same directory as dest)
//!        │
//!        ▼
//!   pin mtime, rename ─▶ dest
//! ```
//!
//! The in-flight guard and the staged download are both dropped on every
//! exit path, so neither the registry entry nor a partial file outlives the
//! call. Directories for `dest` are only created once upstream has answered
//! 200 with a body, so failed lookups leave no trace on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::DateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::cache::{set_modified, StagedFile};
use crate::error::FetchError;

use super::client::OriginClient;
use super::inflight::InFlightRegistry;

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedOrigin {
    /// Where the origin now lives
    pub path: PathBuf,

    /// Bytes written
    pub len: u64,

    /// Provenance timestamp, from `Last-Modified` or the fetch time
    pub modified: SystemTime,
}

/// Largest origin body accepted by default (100 MiB).
pub const DEFAULT_MAX_ORIGIN_BYTES: u64 = 100 * 1024 * 1024;

/// Downloads origin images, at most one in flight per URL.
pub struct OriginFetcher<C: OriginClient> {
    client: C,
    in_flight: Arc<InFlightRegistry>,
    max_bytes: u64,
}

impl<C: OriginClient> OriginFetcher<C> {
    /// Create a fetcher with its own registry.
    pub fn new(client: C) -> Self {
        Self::with_registry(client, Arc::new(InFlightRegistry::new()))
    }

    /// Create a fetcher sharing an existing registry.
    pub fn with_registry(client: C, in_flight: Arc<InFlightRegistry>) -> Self {
        Self {
            client,
            in_flight,
            max_bytes: DEFAULT_MAX_ORIGIN_BYTES,
        }
    }

    /// Reject origin bodies larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Swap in a shared registry.
    pub fn with_in_flight(mut self, in_flight: Arc<InFlightRegistry>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        &self.in_flight
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch `url` into `dest`.
    ///
    /// The destination directory is created if needed. The file appears at
    /// `dest` only once it is complete, with its mtime already set to the
    /// provenance timestamp.
    ///
    /// # Errors
    ///
    /// - [`FetchError::AlreadyFetching`] if another fetch of `url` is running
    /// - [`FetchError::Status`] for any non-200 response
    /// - [`FetchError::EmptyBody`] if the body is empty
    /// - [`FetchError::TooLarge`] if the body exceeds the size limit
    /// - [`FetchError::Connection`] / [`FetchError::Io`] on transport or disk failure
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchedOrigin, FetchError> {
        let _guard = self
            .in_flight
            .try_acquire(url)
            .ok_or_else(|| FetchError::AlreadyFetching {
                url: url.to_string(),
            })?;

        debug!(url = %url, dest = %dest.display(), "fetching origin");

        let mut response = self.client.get(url).await?;

        if response.status != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        match response.content_length {
            Some(0) => {
                return Err(FetchError::EmptyBody {
                    url: url.to_string(),
                })
            }
            Some(len) if len > self.max_bytes => return Err(self.too_large(url)),
            _ => {}
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        // Create before the next await; a dropped future must find the file
        let staged = StagedFile::sibling(dest, "fetch");
        let mut file = std::fs::File::create(staged.path())
            .map(tokio::fs::File::from_std)
            .map_err(|e| io_error(staged.path(), e))?;

        let mut len = 0u64;
        while let Some(chunk) = response.body.chunk().await? {
            if len + chunk.len() as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error(staged.path(), e))?;
            len += chunk.len() as u64;
        }

        if len == 0 {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }

        file.sync_all()
            .await
            .map_err(|e| io_error(staged.path(), e))?;
        drop(file);

        let modified = provenance(url, response.last_modified.as_deref());
        set_modified(staged.path(), modified)
            .await
            .map_err(|e| io_error(staged.path(), e))?;

        staged.persist(dest).map_err(|e| io_error(dest, e))?;

        debug!(url = %url, bytes = len, "origin fetched");

        Ok(FetchedOrigin {
            path: dest.to_path_buf(),
            len,
            modified,
        })
    }

    fn too_large(&self, url: &str) -> FetchError {
        FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }
}

/// Parse an HTTP date (`Last-Modified`).
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

fn provenance(url: &str, last_modified: Option<&str>) -> SystemTime {
    match last_modified {
        Some(value) => parse_http_date(value).unwrap_or_else(|| {
            warn!(url = %url, value = %value, "unparseable Last-Modified, using current time");
            SystemTime::now()
        }),
        None => SystemTime::now(),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> FetchError {
    FetchError::Io(format!("{}: {}", path.display(), err))
}

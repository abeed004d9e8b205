//! Filesystem-backed variant store.
//!
//! # Layout
//!
//! Every variant lives at `<root>/<CachePath>`. Work in progress is written
//! to hidden [`StagedFile`]s and renamed into place, so a reader sees either
//! the complete artifact or nothing.
//!
//! # Provenance
//!
//! The artifact's mtime is pinned to the origin's `Last-Modified` (or the
//! fetch time) before publishing. Nothing here enforces invalidation; the
//! timestamp is kept so a staleness check can compare origin and cache later.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use tracing::debug;

use crate::error::CacheError;
use crate::request::CachePath;

use super::staging::{set_modified_blocking, StagedFile};

// =============================================================================
// Cache Artifact
// =============================================================================

/// A published variant on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheArtifact {
    /// Absolute path of the artifact
    pub path: PathBuf,

    /// Stored provenance timestamp
    pub modified: SystemTime,

    /// Size in bytes
    pub len: u64,
}

/// An artifact together with its bytes, as read on a cache hit.
#[derive(Debug, Clone)]
pub struct CachedVariant {
    pub artifact: CacheArtifact,
    pub data: Bytes,
}

// =============================================================================
// Cache Store
// =============================================================================

/// Variant store rooted at a directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    temp_dir: Option<PathBuf>,
}

impl CacheStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_dir: None,
        }
    }

    /// Use a dedicated scratch directory for origin downloads.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// Absolute path for a cache key. Nothing is created on disk.
    pub fn resolve(&self, key: &CachePath) -> PathBuf {
        self.root.join(key.as_path())
    }

    /// Look up an artifact without reading it.
    pub async fn lookup(&self, key: &CachePath) -> Result<Option<CacheArtifact>, CacheError> {
        let path = self.resolve(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(CacheArtifact {
                modified: meta.modified().map_err(|e| CacheError::io(&path, e))?,
                len: meta.len(),
                path,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Look up and read an artifact.
    ///
    /// An artifact that disappears between the lookup and the read counts as
    /// a miss.
    pub async fn load(&self, key: &CachePath) -> Result<Option<CachedVariant>, CacheError> {
        let Some(artifact) = self.lookup(key).await? else {
            return Ok(None);
        };

        match tokio::fs::read(&artifact.path).await {
            Ok(data) => Ok(Some(CachedVariant {
                artifact,
                data: Bytes::from(data),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&artifact.path, e)),
        }
    }

    /// Stage a file next to `final_path`, where a rename is atomic.
    pub fn stage(&self, final_path: &Path, tag: &str) -> StagedFile {
        StagedFile::sibling(final_path, tag)
    }

    /// Stage a scratch file, in the temp directory when one is configured.
    pub fn stage_scratch(&self, final_path: &Path, tag: &str) -> StagedFile {
        match &self.temp_dir {
            Some(dir) => StagedFile::in_dir(dir, final_path, tag),
            None => StagedFile::sibling(final_path, tag),
        }
    }

    /// Publish a staged file at `final_path` with the given provenance time.
    ///
    /// The directory of `final_path` is created here, once there is an
    /// artifact to publish. The mtime is set before the rename. A staged file
    /// living in another directory (scratch space) is first copied next to
    /// the destination so the final step is still a same-directory rename.
    ///
    /// The work runs on the blocking pool and owns every staged file, so
    /// nothing is left behind if the caller stops waiting.
    pub async fn publish(
        &self,
        staged: StagedFile,
        final_path: &Path,
        modified: SystemTime,
    ) -> Result<CacheArtifact, CacheError> {
        let sibling = if staged.path().parent() == final_path.parent() {
            None
        } else {
            Some(self.stage(final_path, "pub"))
        };
        let dest = final_path.to_path_buf();

        let len = tokio::task::spawn_blocking(move || {
            publish_blocking(staged, sibling, &dest, modified)
        })
        .await
        .map_err(|e| CacheError::Io {
            path: final_path.to_path_buf(),
            message: e.to_string(),
        })??;

        debug!(path = %final_path.display(), bytes = len, "published variant");

        Ok(CacheArtifact {
            path: final_path.to_path_buf(),
            modified,
            len,
        })
    }
}

fn publish_blocking(
    staged: StagedFile,
    sibling: Option<StagedFile>,
    dest: &Path,
    modified: SystemTime,
) -> Result<u64, CacheError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }

    let ready = match sibling {
        Some(sibling) => {
            std::fs::copy(staged.path(), sibling.path())
                .map_err(|e| CacheError::io(sibling.path(), e))?;
            sibling
        }
        None => staged,
    };

    set_modified_blocking(ready.path(), modified).map_err(|e| CacheError::io(ready.path(), e))?;

    let len = std::fs::metadata(ready.path())
        .map_err(|e| CacheError::io(ready.path(), e))?
        .len();

    ready.persist(dest).map_err(|e| CacheError::io(dest, e))?;

    Ok(len)
}

// =============================================================================
// Tests
// =============================================================================

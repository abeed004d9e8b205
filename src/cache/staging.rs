//! Request-scoped temporary files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A temporary file that is removed when dropped unless persisted.
///
/// Staged files are hidden (dot-prefixed) and keep the target's file name as
/// their suffix, so the extension still identifies the image format.
/// Dropping the guard on any exit path (error, early return, task abort)
/// removes the file.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    /// Stage a file in the same directory as `target`.
    pub fn sibling(target: &Path, tag: &str) -> Self {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        Self::in_dir(dir, target, tag)
    }

    /// Stage a file in `dir`, named after `target`.
    pub fn in_dir(dir: &Path, target: &Path, tag: &str) -> Self {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let seq = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!(".{}-{}-{}.{}", tag, std::process::id(), seq, file_name);

        Self {
            path: dir.join(name),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rename the staged file onto `dest`.
    ///
    /// On failure the guard stays armed and the staged file is still removed
    /// on drop.
    pub fn persist(mut self, dest: &Path) -> io::Result<()> {
        std::fs::rename(&self.path, dest)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Set a file's modification time.
pub(crate) async fn set_modified(path: &Path, modified: SystemTime) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || set_modified_blocking(&path, modified))
        .await
        .map_err(io::Error::other)?
}

/// Blocking form of [`set_modified`]. Fails if the file does not exist.
pub(crate) fn set_modified_blocking(path: &Path, modified: SystemTime) -> io::Result<()> {
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(modified)
}

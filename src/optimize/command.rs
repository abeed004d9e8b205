//! External `jpegoptim` optimizer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::OptimizeError;

use super::{is_jpeg, Optimizer, Quality};

const PROGRAM: &str = "jpegoptim";

/// Runs `jpegoptim -m<quality>` on JPEG files.
///
/// `jpegoptim` rewrites the file itself and only when the result is smaller.
#[derive(Debug, Clone)]
pub struct JpegoptimOptimizer {
    program: PathBuf,
}

impl Default for JpegoptimOptimizer {
    fn default() -> Self {
        Self {
            program: PathBuf::from(PROGRAM),
        }
    }
}

impl JpegoptimOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Optimizer for JpegoptimOptimizer {
    async fn optimize(&self, path: &Path, quality: Quality) -> Result<(), OptimizeError> {
        if !is_jpeg(path) {
            return Ok(());
        }

        let output = Command::new(&self.program)
            .arg("--quiet")
            .arg(format!("-m{}", quality.get()))
            .arg(path)
            .output()
            .await
            .map_err(|e| OptimizeError::CommandFailed {
                program: PROGRAM,
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(OptimizeError::CommandFailed {
                program: PROGRAM,
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        debug!(path = %path.display(), quality = quality.get(), "jpegoptim finished");
        Ok(())
    }
}

//! Operation dispatch.
//!
//! Maps a [`TransformSpec`] onto a concrete [`Geometry`] and runs it through
//! the configured [`Transformer`]. This is also where the preconditions
//! common to every operation are enforced and where a failed output is
//! cleaned up.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::TransformError;
use crate::request::{Operation, TransformSpec};

use super::backend::{Geometry, Transformer};
use super::geometry::{is_wider, AspectRatio};

/// Opaque white.
pub const DEFAULT_BACKGROUND: [u8; 4] = [255, 255, 255, 255];

/// Applies transform specs using an injected [`Transformer`].
#[derive(Clone)]
pub struct TransformDispatcher {
    transformer: Arc<dyn Transformer>,
    aspect: AspectRatio,
    background: [u8; 4],
}

impl std::fmt::Debug for TransformDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformDispatcher")
            .field("aspect", &self.aspect)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

impl TransformDispatcher {
    /// Create a dispatcher with a 16:9 thumbnail ratio and white padding.
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self {
            transformer,
            aspect: AspectRatio::SIXTEEN_NINE,
            background: DEFAULT_BACKGROUND,
        }
    }

    pub fn with_aspect(mut self, aspect: AspectRatio) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_background(mut self, background: [u8; 4]) -> Self {
        self.background = background;
        self
    }

    /// Resolve `spec` into a geometry for `source`.
    ///
    /// Only the aspect thumbnail looks at the source, and only at its header.
    ///
    /// # Errors
    ///
    /// - [`TransformError::MissingDimension`] if resize-to-width has no width
    ///   or crop-to-fit lacks either side
    /// - [`TransformError::InsufficientParams`] if the aspect thumbnail has
    ///   neither side
    /// - [`TransformError::NoOperation`] for [`Operation::None`]
    pub fn plan(&self, source: &Path, spec: &TransformSpec) -> Result<Geometry, TransformError> {
        match spec.operation {
            Operation::ResizeToWidth => {
                let width = spec.width.ok_or(TransformError::MissingDimension {
                    operation: "resize-to-width",
                    dimension: "width",
                })?;
                Ok(Geometry::ResizeToWidth {
                    width,
                    max_height: spec.height,
                })
            }
            Operation::CropToFit => {
                let width = spec.width.ok_or(TransformError::MissingDimension {
                    operation: "crop-to-fit",
                    dimension: "width",
                })?;
                let height = spec.height.ok_or(TransformError::MissingDimension {
                    operation: "crop-to-fit",
                    dimension: "height",
                })?;
                Ok(Geometry::Cover { width, height })
            }
            Operation::ThumbnailAspect => {
                let target = self
                    .aspect
                    .box_for(spec.width, spec.height)
                    .ok_or(TransformError::InsufficientParams)?;

                let source_dims = self.transformer.identify(source)?;

                if is_wider(source_dims, target) {
                    Ok(Geometry::Cover {
                        width: target.width,
                        height: target.height,
                    })
                } else {
                    Ok(Geometry::Contain {
                        width: target.width,
                        height: target.height,
                        background: self.background,
                    })
                }
            }
            Operation::None => Err(TransformError::NoOperation),
        }
    }

    /// Transform `source` into `dest`.
    ///
    /// Blocks the calling thread for the duration of the backend call.
    ///
    /// # Errors
    ///
    /// - [`TransformError::SourceNotFound`] if `source` is not a file
    /// - [`TransformError::DestinationMissing`] if the parent of `dest` is not a directory
    /// - any planning or backend error; `dest` is removed in that case
    pub fn apply(
        &self,
        source: &Path,
        spec: &TransformSpec,
        dest: &Path,
    ) -> Result<Geometry, TransformError> {
        if !source.is_file() {
            return Err(TransformError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let dest_dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !dest_dir.is_dir() {
            return Err(TransformError::DestinationMissing {
                path: dest_dir.to_path_buf(),
            });
        }

        let geometry = self.plan(source, spec)?;
        debug!(
            source = %source.display(),
            dest = %dest.display(),
            geometry = ?geometry,
            "applying transform"
        );

        if let Err(e) = self.transformer.apply(source, dest, &geometry) {
            discard(dest);
            return Err(e);
        }

        Ok(geometry)
    }
}

fn discard(dest: &Path) {
    match std::fs::remove_file(dest) {
        Ok(()) => debug!(path = %dest.display(), "removed partial transform output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dest.display(), error = %e, "failed to remove partial output"),
    }
}

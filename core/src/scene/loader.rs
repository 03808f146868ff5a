//! Scene loader contract.

use std::path::{Path, PathBuf};

use super::{SceneBinding, SceneFlags};

/// Errors reported by scene loaders.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The scene file does not exist.
    #[error("scene file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The scene file could not be read.
    #[error("failed to read scene {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The loader rejected the scene.
    #[error("invalid scene {}: {reason}", path.display())]
    Invalid {
        /// Path that failed.
        path: PathBuf,
        /// Loader-specific explanation.
        reason: String,
    },
}

/// Produces [`SceneBinding`]s from files.
///
/// Implementations own all knowledge of scene formats. The flags are passed
/// through verbatim and end up on the returned binding.
pub trait SceneLoader: Send + Sync {
    /// Load the scene at `path` with the given builder flags.
    fn load_scene(&self, path: &Path, flags: SceneFlags) -> Result<SceneBinding, SceneError>;
}

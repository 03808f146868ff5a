//! Default scene loader.

use std::collections::HashMap;
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use lantern_core::scene::{SceneBinding, SceneDescriptor, SceneError, SceneFlags, SceneLoader};
use parking_lot::Mutex;

/// Loads scenes from files without parsing them.
///
/// The scene is derived from the file identity: its path, size and
/// modification time seed the procedural content. Loading the same file with
/// the same flags again returns the cached binding, so accumulation carries
/// on across reloads. Touching the file produces a new scene.
#[derive(Debug, Default)]
pub struct FileSceneLoader {
    cache: Mutex<HashMap<(PathBuf, SceneFlags), (u64, SceneBinding)>>,
}

impl FileSceneLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached scenes.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Forget every cached scene.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn fingerprint(path: &Path) -> Result<u64, SceneError> {
        let metadata = fs::metadata(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(SceneError::Invalid {
                path: path.to_path_buf(),
                reason: "not a file".into(),
            });
        }

        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        metadata.len().hash(&mut hasher);
        if let Ok(modified) = metadata.modified() {
            modified.hash(&mut hasher);
        }
        Ok(hasher.finish())
    }
}

impl SceneLoader for FileSceneLoader {
    fn load_scene(&self, path: &Path, flags: SceneFlags) -> Result<SceneBinding, SceneError> {
        if !path.exists() {
            return Err(SceneError::NotFound(path.to_path_buf()));
        }
        let fingerprint = Self::fingerprint(path)?;
        let key = (path.to_path_buf(), flags);

        let mut cache = self.cache.lock();
        if let Some((cached, scene)) = cache.get(&key) {
            if *cached == fingerprint {
                log::debug!("FileSceneLoader: reusing {}", path.display());
                return Ok(scene.clone());
            }
        }

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let scene = SceneBinding::new(SceneDescriptor {
            name,
            source: Some(path.to_path_buf()),
            flags,
            seed: fingerprint,
            light_count: 1 + (fingerprint % 4) as u32,
            bounds_radius: 1.0,
            ..Default::default()
        });
        log::info!(
            "Loaded scene '{}' from {} ({} lights, flags {:?})",
            scene.name(),
            path.display(),
            scene.light_count(),
            flags
        );
        cache.insert(key, (fingerprint, scene.clone()));
        Ok(scene)
    }
}

//! Opaque scene handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::SceneFlags;

/// Process-unique identity of a loaded scene.
///
/// Two bindings compare equal by identity only when they were cloned from the
/// same loaded scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

impl SceneId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Camera description using plain arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCamera {
    /// Eye position [x, y, z].
    pub position: [f32; 3],
    /// Look-at target [x, y, z].
    pub target: [f32; 3],
    /// Vertical field of view in radians.
    pub fov_y: f32,
}

impl Default for SceneCamera {
    fn default() -> Self {
        Self {
            position: [0.0, 1.0, 4.0],
            target: [0.0, 0.5, 0.0],
            fov_y: std::f32::consts::FRAC_PI_4,
        }
    }
}

/// Everything a loader knows about a scene.
///
/// Fields are consumed by passes; the graph itself only looks at `flags`.
#[derive(Debug, Clone)]
pub struct SceneDescriptor {
    /// Display name.
    pub name: String,
    /// File the scene was loaded from, if any.
    pub source: Option<PathBuf>,
    /// Builder flags the scene was loaded with.
    pub flags: SceneFlags,
    /// Seed for deterministic procedural content.
    pub seed: u64,
    /// Number of emissive and analytic lights (env map counts as one).
    pub light_count: u32,
    /// Radius of the scene bounding sphere.
    pub bounds_radius: f32,
    /// Active camera.
    pub camera: SceneCamera,
}

impl Default for SceneDescriptor {
    fn default() -> Self {
        Self {
            name: "empty".to_string(),
            source: None,
            flags: SceneFlags::empty(),
            seed: 0,
            light_count: 0,
            bounds_radius: 1.0,
            camera: SceneCamera::default(),
        }
    }
}

#[derive(Debug)]
struct SceneData {
    id: SceneId,
    desc: SceneDescriptor,
}

/// Cheap, cloneable handle to loaded scene data.
///
/// Passes receive a `&SceneBinding` for the duration of one frame and copy
/// out whatever they need to keep; they never retain the handle itself.
#[derive(Debug, Clone)]
pub struct SceneBinding(Arc<SceneData>);

impl SceneBinding {
    /// Wrap a descriptor into a new scene with a fresh identity.
    pub fn new(desc: SceneDescriptor) -> Self {
        let id = SceneId::next();
        log::debug!("Scene '{}' bound as {:?}", desc.name, id);
        Self(Arc::new(SceneData { id, desc }))
    }

    /// A scene with no content, used when no scene has been loaded.
    pub fn empty() -> Self {
        Self::new(SceneDescriptor::default())
    }

    /// Identity of the loaded scene.
    pub fn id(&self) -> SceneId {
        self.0.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.0.desc.name
    }

    /// Source file, if any.
    pub fn source(&self) -> Option<&Path> {
        self.0.desc.source.as_deref()
    }

    /// Builder flags.
    pub fn flags(&self) -> SceneFlags {
        self.0.desc.flags
    }

    /// Procedural content seed.
    pub fn seed(&self) -> u64 {
        self.0.desc.seed
    }

    /// Light count.
    pub fn light_count(&self) -> u32 {
        self.0.desc.light_count
    }

    /// Bounding sphere radius.
    pub fn bounds_radius(&self) -> f32 {
        self.0.desc.bounds_radius
    }

    /// Active camera.
    pub fn camera(&self) -> &SceneCamera {
        &self.0.desc.camera
    }

    /// Full descriptor.
    pub fn descriptor(&self) -> &SceneDescriptor {
        &self.0.desc
    }

    /// Check whether two handles refer to the same loaded scene.
    pub fn same_scene(&self, other: &SceneBinding) -> bool {
        self.id() == other.id()
    }
}

impl Default for SceneBinding {
    fn default() -> Self {
        Self::empty()
    }
}

//! Scene builder and scene update flags.

use bitflags::bitflags;

bitflags! {
    /// Options passed to a scene loader.
    ///
    /// The graph reads only [`DONT_OPTIMIZE_GRAPH`](Self::DONT_OPTIMIZE_GRAPH);
    /// every other flag is carried through untouched for passes and loaders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
    pub struct SceneFlags: u32 {
        /// Disable graph-level optimization (storage aliasing, output elision).
        const DONT_OPTIMIZE_GRAPH = 1 << 0;
        /// Keep materials separate even when they are identical.
        const DONT_MERGE_MATERIALS = 1 << 1;
        /// Keep meshes separate even when they could be merged.
        const DONT_MERGE_MESHES = 1 << 2;
        /// Use tangents from the source data instead of generating them.
        const USE_ORIGINAL_TANGENTS = 1 << 3;
        /// Force 32-bit index buffers.
        const FORCE_32BIT_INDICES = 1 << 4;
        /// Do not load emissive triangle lights.
        const DONT_USE_EMISSIVE_LIGHTS = 1 << 5;
    }
}

bitflags! {
    /// Scene changes reported for a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneUpdates: u32 {
        /// Camera position or orientation changed.
        const CAMERA_MOVED = 1 << 0;
        /// Camera intrinsics (fov, aperture, focal distance) changed.
        const CAMERA_PROPERTIES_CHANGED = 1 << 1;
        /// Only sub-pixel jitter changed.
        const CAMERA_JITTER = 1 << 2;
        /// Only the previous-frame camera history changed.
        const CAMERA_HISTORY = 1 << 3;
        /// Geometry was moved, added or removed.
        const GEOMETRY_CHANGED = 1 << 4;
        /// Analytic or emissive lights changed.
        const LIGHTS_CHANGED = 1 << 5;
        /// Material parameters changed.
        const MATERIALS_CHANGED = 1 << 6;
        /// The environment map changed.
        const ENV_MAP_CHANGED = 1 << 7;
    }
}

impl SceneUpdates {
    /// Updates that leave converged images valid.
    pub const BENIGN: Self = Self::CAMERA_JITTER.union(Self::CAMERA_HISTORY);

    /// Whether these updates invalidate accumulated results.
    pub fn invalidates_accumulation(self) -> bool {
        !self.difference(Self::BENIGN).is_empty()
    }
}

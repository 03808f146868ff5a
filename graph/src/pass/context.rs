//! Per-pass execution context.

use bitflags::bitflags;
use lantern_core::scene::SceneBinding;

use crate::error::PassError;
use crate::resources::Resource;
use crate::types::Extent2d;

bitflags! {
    /// Frame-scoped signals raised by passes for downstream passes.
    ///
    /// Flags raised during a frame are visible to every later pass in the
    /// same frame and are cleared when the next frame starts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RefreshFlags: u32 {
        /// Render options changed; accumulated results are stale.
        const RENDER_OPTIONS_CHANGED = 1 << 0;
        /// Lighting changed; accumulated results are stale.
        const LIGHTING_CHANGED = 1 << 1;
    }
}

/// Frame-level information visible to every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Monotonic frame counter, starting at 1.
    pub index: u64,
    /// Frame resolution.
    pub resolution: Extent2d,
}

/// An input bound for one execution.
#[derive(Debug, Clone, Copy)]
pub struct InputBinding<'a> {
    pub port: &'a str,
    pub resource: &'a Resource,
}

/// An output bound for one execution.
#[derive(Debug)]
pub struct OutputBinding {
    pub port: String,
    pub resource: Resource,
}

/// What a pass sees while it executes.
///
/// Inputs are read-only views of upstream storage. Outputs are exclusively
/// owned by the pass for the duration of the call; in-place ports arrive
/// pre-filled with their upstream data.
pub struct PassContext<'a> {
    pass_name: &'a str,
    frame: FrameInfo,
    scene: &'a SceneBinding,
    inputs: &'a [InputBinding<'a>],
    outputs: &'a mut [OutputBinding],
    refresh: &'a mut RefreshFlags,
}

impl<'a> PassContext<'a> {
    pub fn new(
        pass_name: &'a str,
        frame: FrameInfo,
        scene: &'a SceneBinding,
        inputs: &'a [InputBinding<'a>],
        outputs: &'a mut [OutputBinding],
        refresh: &'a mut RefreshFlags,
    ) -> Self {
        Self {
            pass_name,
            frame,
            scene,
            inputs,
            outputs,
            refresh,
        }
    }

    /// Name of the executing pass instance.
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    pub fn frame(&self) -> FrameInfo {
        self.frame
    }

    pub fn scene(&self) -> &SceneBinding {
        self.scene
    }

    /// Connected input, if any.
    pub fn input(&self, port: &str) -> Option<&'a Resource> {
        self.inputs
            .iter()
            .find(|binding| binding.port == port)
            .map(|binding| binding.resource)
    }

    /// Connected input, or [`PassError::MissingInput`].
    pub fn require_input(&self, port: &str) -> Result<&'a Resource, PassError> {
        self.input(port)
            .ok_or_else(|| PassError::MissingInput(port.to_string()))
    }

    /// Output storage, if the output was allocated this frame.
    ///
    /// Elided optional outputs return `None`.
    pub fn output(&mut self, port: &str) -> Option<&mut Resource> {
        self.outputs
            .iter_mut()
            .find(|binding| binding.port == port)
            .map(|binding| &mut binding.resource)
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|binding| binding.port == port)
    }

    /// All allocated outputs.
    pub fn outputs_mut(&mut self) -> impl Iterator<Item = (&str, &mut Resource)> {
        self.outputs
            .iter_mut()
            .map(|binding| (binding.port.as_str(), &mut binding.resource))
    }

    /// Signals raised so far this frame.
    pub fn refresh_flags(&self) -> RefreshFlags {
        *self.refresh
    }

    /// Raise signals for downstream passes.
    pub fn raise(&mut self, flags: RefreshFlags) {
        *self.refresh |= flags;
    }
}

//! Frame loop host.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lantern_core::scene::{SceneBinding, SceneError, SceneFlags, SceneLoader, SceneUpdates};
use lantern_graph::{
    ExecutionError, ExecutorConfig, FrameOutputs, GraphDescription, LoadError, PassRegistry,
    RenderGraph,
};

use crate::args::SandboxOptions;
use crate::capture::{self, CaptureError};
use crate::scene_loader::FileSceneLoader;

/// Description of the graph used when none is given.
pub const DEFAULT_GRAPH: &str = include_str!("../graphs/TestPathTracer.toml");

/// Errors reported by the sandbox.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("no render graph is set")]
    NoGraph,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Outcome of [`Sandbox::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Frames that completed.
    pub frames: u64,
    /// Frames that failed and were skipped.
    pub failed: u64,
    /// The loop stopped because of [`InterruptHandle::interrupt`].
    pub interrupted: bool,
}

/// Stops a running [`Sandbox::run`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

/// Hosts one active render graph and one bound scene.
///
/// Every frame executes the graph against the scene. Failed frames are
/// logged and reported; the sandbox stays usable for the next frame.
pub struct Sandbox {
    registry: Arc<PassRegistry>,
    loader: Box<dyn SceneLoader>,
    graph: Option<RenderGraph>,
    scene: SceneBinding,
    config: ExecutorConfig,
    frame_count: u64,
    interrupt: InterruptHandle,
}

impl Sandbox {
    /// Create a sandbox with the built-in pass types and the file scene loader.
    pub fn new(options: &SandboxOptions) -> Self {
        Self::with_registry(options, Arc::new(PassRegistry::global().clone()))
    }

    /// Create a sandbox sharing `registry`.
    pub fn with_registry(options: &SandboxOptions, registry: Arc<PassRegistry>) -> Self {
        Self {
            registry,
            loader: Box::new(FileSceneLoader::new()),
            graph: None,
            scene: SceneBinding::empty(),
            config: options.executor_config(),
            frame_count: 0,
            interrupt: InterruptHandle::default(),
        }
    }

    /// Replace the scene loader.
    pub fn with_loader(mut self, loader: impl SceneLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn registry(&self) -> &Arc<PassRegistry> {
        &self.registry
    }

    /// Frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    // ========================================================================
    // Graph
    // ========================================================================

    /// Create an empty graph configured for this sandbox.
    pub fn create_graph(&self, name: &str) -> RenderGraph {
        RenderGraph::with_config(name, self.config.clone())
    }

    /// Build a graph from a TOML description file and make it active.
    pub fn load_graph(&mut self, path: impl AsRef<Path>) -> Result<(), SandboxError> {
        let graph = GraphDescription::load(path)?.build(&self.registry, self.config.clone())?;
        self.set_graph(graph);
        Ok(())
    }

    /// Make the built-in TestPathTracer graph active.
    pub fn load_default_graph(&mut self) -> Result<(), SandboxError> {
        let graph =
            GraphDescription::from_toml_str(DEFAULT_GRAPH)?.build(&self.registry, self.config.clone())?;
        self.set_graph(graph);
        Ok(())
    }

    /// Make `graph` active, matching it to the sandbox resolution and budget.
    pub fn set_graph(&mut self, mut graph: RenderGraph) {
        let resolution = self.config.resolution;
        graph.resize(resolution.width, resolution.height);
        graph.set_memory_budget(self.config.memory_budget);
        log::info!(
            "Sandbox: active graph '{}' ({} passes)",
            graph.name(),
            graph.pass_count()
        );
        self.graph = Some(graph);
    }

    pub fn graph(&self) -> Option<&RenderGraph> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut RenderGraph> {
        self.graph.as_mut()
    }

    /// Remove the active graph.
    pub fn take_graph(&mut self) -> Option<RenderGraph> {
        self.graph.take()
    }

    // ========================================================================
    // Scene
    // ========================================================================

    /// Load a scene through the scene loader and bind it for the next frame.
    pub fn load_scene(&mut self, path: impl AsRef<Path>, flags: SceneFlags) -> Result<(), SandboxError> {
        let scene = self.loader.load_scene(path.as_ref(), flags)?;
        self.set_scene(scene);
        Ok(())
    }

    pub fn set_scene(&mut self, scene: SceneBinding) {
        self.scene = scene;
    }

    pub fn scene(&self) -> &SceneBinding {
        &self.scene
    }

    /// Forward scene change notifications to the graph.
    pub fn on_scene_updates(&mut self, updates: SceneUpdates) {
        if let Some(graph) = &mut self.graph {
            graph.on_scene_updates(updates);
        }
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Run one frame.
    pub fn frame(&mut self) -> Result<(), SandboxError> {
        lantern_core::profile_function!();
        let graph = self.graph.as_mut().ok_or(SandboxError::NoGraph)?;
        match graph.execute(&self.scene) {
            Ok(_) => {
                self.frame_count += 1;
                Ok(())
            }
            Err(err) => {
                log::error!("Sandbox: frame {} failed: {err}", graph.frame_index());
                Err(err.into())
            }
        }
    }

    /// Run `max_frames` frames, or until interrupted when `max_frames` is zero.
    ///
    /// Frames failed by a pass are counted and skipped. A graph that fails to
    /// resolve stops the run with [`ExecutionError::GraphInvalid`].
    pub fn run(&mut self, max_frames: u64) -> Result<RunSummary, SandboxError> {
        if self.graph.is_none() {
            return Err(SandboxError::NoGraph);
        }

        let mut summary = RunSummary::default();
        while max_frames == 0 || summary.frames + summary.failed < max_frames {
            if self.interrupt.take() {
                log::info!("Sandbox: interrupted");
                summary.interrupted = true;
                break;
            }
            match self.frame() {
                Ok(()) => summary.frames += 1,
                // A graph that cannot be resolved fails every frame the same way.
                Err(err @ SandboxError::Execution(ExecutionError::GraphInvalid(_))) => {
                    return Err(err);
                }
                Err(SandboxError::Execution(_)) => summary.failed += 1,
                Err(err) => return Err(err),
            }
        }

        log::info!(
            "Sandbox: ran {} frames ({} failed)",
            summary.frames,
            summary.failed
        );
        Ok(summary)
    }

    /// Change the frame resolution of the sandbox and the active graph.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.resolution = lantern_graph::Extent2d::new(width, height);
        if let Some(graph) = &mut self.graph {
            graph.resize(width, height);
        }
    }

    /// Restart accumulation in every accumulating pass.
    pub fn request_reset(&mut self) -> usize {
        self.graph
            .as_mut()
            .map_or(0, |graph| graph.reset_accumulation())
    }

    /// Marked outputs of the last completed frame.
    pub fn outputs(&self) -> Option<FrameOutputs<'_>> {
        self.graph.as_ref()?.outputs()
    }

    /// Names of the marked outputs, in marking order.
    pub fn output_names(&self) -> Vec<String> {
        self.graph
            .iter()
            .flat_map(|graph| graph.marked_outputs())
            .map(ToString::to_string)
            .collect()
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Write marked output `index` of the last completed frame as a PNG.
    pub fn capture_output(&self, path: impl AsRef<Path>, index: usize) -> Result<(), CaptureError> {
        let outputs = self.outputs().ok_or(CaptureError::NoFrame)?;
        let (_, resource) = outputs.get_index(index).ok_or(CaptureError::OutputIndex {
            index,
            count: outputs.len(),
        })?;
        capture::write_png(resource, path.as_ref())
    }

    /// Write every marked output into `dir` as `<Pass>.<port>.<frame>.png`.
    pub fn capture_all(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, CaptureError> {
        let dir = dir.as_ref();
        let outputs = self.outputs().ok_or(CaptureError::NoFrame)?;
        fs::create_dir_all(dir).map_err(|source| CaptureError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(outputs.len());
        for (port, resource) in outputs.iter() {
            let path = dir.join(format!("{port}.{}.png", self.frame_count));
            capture::write_png(resource, &path)?;
            written.push(path);
        }
        log::info!("Sandbox: captured {} outputs to {}", written.len(), dir.display());
        Ok(written)
    }
}

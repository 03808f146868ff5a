//! Sandbox options and their command line form.
//!
//! [`SandboxOptions`] is what a [`Sandbox`](crate::Sandbox) is configured
//! from. [`CliArgs`] parses the `lantern` command line with clap and converts
//! into it.

use std::path::PathBuf;

use clap::Parser;
use lantern_core::scene::SceneFlags;
use lantern_graph::{Extent2d, ExecutorConfig};

/// Frames run by the command line runner when `--frames` is not given.
pub const DEFAULT_FRAMES: u64 = 16;

/// Everything needed to set up a sandbox run.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxOptions {
    /// Graph description to load. `None` uses the built-in TestPathTracer graph.
    pub graph: Option<PathBuf>,
    /// Scene to load. `None` renders the empty scene.
    pub scene: Option<PathBuf>,
    /// Builder flags passed to the scene loader.
    pub scene_flags: SceneFlags,
    /// Frames to run; zero runs until interrupted.
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    /// Directory to write marked outputs to after the run.
    pub capture_dir: Option<PathBuf>,
    pub memory_budget: Option<u64>,
    pub allow_aliasing: bool,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            graph: None,
            scene: None,
            scene_flags: SceneFlags::empty(),
            frames: DEFAULT_FRAMES,
            width: 1280,
            height: 720,
            capture_dir: None,
            memory_budget: None,
            allow_aliasing: true,
        }
    }
}

impl SandboxOptions {
    /// Set the frame resolution.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of frames to run.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_graph(mut self, path: impl Into<PathBuf>) -> Self {
        self.graph = Some(path.into());
        self
    }

    pub fn with_scene(mut self, path: impl Into<PathBuf>, flags: SceneFlags) -> Self {
        self.scene = Some(path.into());
        self.scene_flags = flags;
        self
    }

    pub fn with_memory_budget(mut self, budget: Option<u64>) -> Self {
        self.memory_budget = budget;
        self
    }

    pub fn resolution(&self) -> Extent2d {
        Extent2d::new(self.width, self.height)
    }

    /// Executor configuration for graphs created by the sandbox.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_resolution(self.resolution())
            .with_memory_budget(self.memory_budget)
            .with_aliasing(self.allow_aliasing)
    }
}

/// Lantern render graph runner.
#[derive(Parser, Debug)]
#[command(
    name = "lantern",
    about = "Run a render graph for a number of frames",
    long_about = "Loads a render graph description and a scene, runs the graph on the CPU \
        reference backend and optionally writes every marked output as a PNG.\n\n\
        EXAMPLES:\n\
          # Built-in path tracer graph, 16 frames, captured to ./out\n\
          lantern --capture out\n\
        \n\
          # Custom graph against a scene without graph optimization\n\
          lantern --graph graphs/MyGraph.toml --scene scenes/room.pyscene --dont-optimize-graph",
    version
)]
pub struct CliArgs {
    /// Graph description (TOML). Defaults to the built-in TestPathTracer graph.
    #[arg(long)]
    pub graph: Option<PathBuf>,

    /// Scene file to load.
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// Number of frames to run (0 runs until interrupted).
    #[arg(long, default_value_t = DEFAULT_FRAMES)]
    pub frames: u64,

    /// Frame width in pixels.
    #[arg(long, default_value = "1280", value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value = "720", value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Disable storage aliasing and unused output elision for this scene.
    #[arg(long)]
    pub dont_optimize_graph: bool,

    /// Keep identical materials separate when loading the scene.
    #[arg(long)]
    pub dont_merge_materials: bool,

    /// Write every marked output of the last frame into this directory.
    #[arg(long)]
    pub capture: Option<PathBuf>,

    /// Cap on resource memory in bytes.
    #[arg(long)]
    pub memory_budget: Option<u64>,
}

impl CliArgs {
    /// Scene builder flags selected on the command line.
    pub fn scene_flags(&self) -> SceneFlags {
        let mut flags = SceneFlags::empty();
        flags.set(SceneFlags::DONT_OPTIMIZE_GRAPH, self.dont_optimize_graph);
        flags.set(SceneFlags::DONT_MERGE_MATERIALS, self.dont_merge_materials);
        flags
    }
}

impl From<CliArgs> for SandboxOptions {
    fn from(args: CliArgs) -> Self {
        if args.scene.is_none() && args.dont_merge_materials {
            log::warn!("--dont-merge-materials has no effect without --scene");
        }
        if args.frames == 0 {
            log::info!("--frames 0: running until interrupted");
        }

        Self {
            scene_flags: args.scene_flags(),
            graph: args.graph,
            scene: args.scene,
            frames: args.frames,
            width: args.width,
            height: args.height,
            capture_dir: args.capture,
            memory_budget: args.memory_budget,
            allow_aliasing: true,
        }
    }
}

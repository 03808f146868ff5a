//! # Lantern App
//!
//! Hosts a render graph against a scene and drives it frame by frame.
//!
//! ## Overview
//!
//! - [`Sandbox`] - Owns the active graph and scene, runs frames, captures outputs
//! - [`SandboxOptions`] / [`CliArgs`] - Run configuration and its command line form
//! - [`FileSceneLoader`] - Default [`SceneLoader`](lantern_core::scene::SceneLoader)
//! - [`capture`] - PNG export of graph outputs
//!
//! ## Example
//!
//! ```ignore
//! use lantern_app::{Sandbox, SandboxOptions};
//!
//! let options = SandboxOptions::default().with_size(320, 180).with_frames(8);
//! let mut sandbox = Sandbox::new(&options);
//! sandbox.load_default_graph()?;
//! sandbox.run(options.frames)?;
//! sandbox.capture_all("out")?;
//! ```

mod args;
pub mod capture;
mod sandbox;
mod scene_loader;

pub use args::{CliArgs, DEFAULT_FRAMES, SandboxOptions};
pub use capture::CaptureError;
pub use sandbox::{DEFAULT_GRAPH, InterruptHandle, RunSummary, Sandbox, SandboxError};
pub use scene_loader::FileSceneLoader;

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the app subsystem.
pub fn init() {
    log::info!("Lantern App v{} initialized", VERSION);
}

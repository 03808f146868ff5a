//! # Lantern Core
//!
//! Shared collaborator types for the Lantern render graph:
//!
//! - [`scene`] - Opaque scene handles, scene builder flags, scene update flags
//!   and the [`SceneLoader`](scene::SceneLoader) contract
//! - [`profiling`] - Optional Tracy instrumentation macros

pub mod profiling;
pub mod scene;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("Lantern Core v{} initialized", VERSION);
}

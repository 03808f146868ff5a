//! # Lantern Graph
//!
//! Render graph construction, scheduling and per-frame execution.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`PassRegistry`] - Pass type names mapped to validated factories
//! - [`RenderGraph`] - Named passes, port-to-port edges and marked outputs
//! - [`compiler`] - Topological ordering with cycle and unbound-input detection
//! - [`resources`] - Liveness-based storage planning and a budgeted pool
//! - [`passes`] - CPU reference implementations of the built-in pass types
//! - [`GraphDescription`] - TOML graph files
//!
//! ## Example
//!
//! ```ignore
//! use lantern_graph::{PassRegistry, Properties, RenderGraph};
//! use lantern_core::scene::SceneBinding;
//!
//! let registry = PassRegistry::global();
//! let mut graph = RenderGraph::new("TestPathTracer");
//! graph.create_pass(registry, "GBufferRT", "G", &Properties::new())?;
//! graph.create_pass(registry, "PathTracer", "P", &Properties::new())?;
//! graph.create_pass(registry, "AccumulatePass", "Acc", &Properties::new())?;
//! graph.add_edge("G.vbuffer", "P.vbuffer")?;
//! graph.add_edge("P.color", "Acc.input")?;
//! graph.mark_output("Acc.output")?;
//!
//! let outputs = graph.execute(&SceneBinding::empty())?;
//! let image = outputs.get("Acc.output");
//! ```

pub mod compiler;
pub mod description;
pub mod error;
pub mod executor;
pub mod graph;
pub mod pass;
pub mod passes;
pub mod registry;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use compiler::{CompiledGraph, ResolvedInput};
pub use description::{EdgeDescription, GraphDescription, LoadError, PassDescription};
pub use error::{ConstructionError, ExecutionError, GraphError, PassError, StructuralError};
pub use executor::{Executor, ExecutorConfig, FrameOutputs};
pub use graph::{Edge, GraphState, PassHandle, RenderGraph};
pub use pass::{
    AccumulationSettings, Accumulator, FrameInfo, ParamKind, ParamSchema, PassBody, PassContext,
    PassInstance, PortDesc, PortDirection, PortFlags, PortRef, RefreshFlags, RenderPass,
};
pub use registry::{PassRegistry, PassRegistryBuilder, PluginFactory};
pub use resources::{Resource, ResourceLifetime, ResourcePlan, ResourcePool, SlotKey};
pub use types::{Extent2d, ParamValue, PortExtent, Properties, ResourceDesc, ResourceKind};

/// Graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graph subsystem.
///
/// Builds the global [`PassRegistry`] up front so the first graph does not
/// pay for it, and logs the registered pass types.
pub fn init() {
    let registry = PassRegistry::global();
    let types: Vec<&str> = registry.type_names().collect();
    log::info!(
        "Lantern Graph v{} initialized ({} pass types: {})",
        VERSION,
        registry.len(),
        types.join(", ")
    );
}

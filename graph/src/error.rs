//! Error types for graph construction, resolution and execution.
//!
//! Errors are grouped by the phase that reports them:
//!
//! - [`ConstructionError`] - Synchronous rejection of a mutation; the graph is unchanged
//! - [`StructuralError`] - Reported by the resolver when the graph cannot be scheduled
//! - [`ExecutionError`] - Reported by [`RenderGraph::execute`](crate::RenderGraph::execute)
//! - [`PassError`] - Raised by a pass body or the resource pool while a pass runs
//!
//! [`GraphError`] wraps all of them for callers that do not care about the phase.

use crate::description::LoadError;
use crate::pass::{PortDirection, PortRef};
use crate::types::ResourceKind;

/// A mutation was rejected. The graph is left exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("unknown pass type '{type_name}'")]
    UnknownPassType { type_name: String },

    #[error("pass type '{type_name}' is already registered")]
    DuplicatePassType { type_name: String },

    #[error("invalid option '{option}' for pass type '{pass_type}': {reason}")]
    InvalidParameter {
        pass_type: String,
        option: String,
        reason: String,
    },

    #[error("a pass named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("invalid pass name '{name}': names must be non-empty and must not contain '.'")]
    InvalidPassName { name: String },

    #[error("no pass named '{name}'")]
    UnknownPass { name: String },

    #[error("unknown port '{port}'")]
    UnknownPort { port: PortRef },

    #[error("malformed port path '{path}', expected 'pass.port'")]
    MalformedPortPath { path: String },

    #[error("port '{port}' cannot be used as {expected:?}")]
    DirectionMismatch {
        port: PortRef,
        expected: PortDirection,
    },

    #[error("input '{port}' is already bound to '{bound_to}'")]
    PortAlreadyBound { port: PortRef, bound_to: PortRef },

    #[error("cannot connect '{src}' ({src_kind}) to '{dst}' ({dst_kind})")]
    TypeMismatch {
        src: PortRef,
        src_kind: ResourceKind,
        dst: PortRef,
        dst_kind: ResourceKind,
    },

    #[error("pass '{pass}' cannot feed itself")]
    SelfEdge { pass: String },

    #[error("no edge from '{src}' to '{dst}'")]
    EdgeNotFound { src: PortRef, dst: PortRef },
}

/// The graph cannot be scheduled in its current shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// Passes depend on each other in a loop.
    ///
    /// `cycle` lists pass names along the loop with the first name repeated
    /// at the end, e.g. `["A", "B", "C", "A"]`.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A required input has no incoming edge.
    #[error("required input '{port}' is not connected")]
    UnsatisfiedInput { port: PortRef },
}

/// Failure raised while a single pass runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PassError {
    /// Storage for an output would exceed the memory budget.
    #[error("resource exhausted: {requested} bytes requested, {available} bytes available")]
    ResourceExhausted { requested: u64, available: u64 },

    /// The pass cannot run with its current inputs or configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A connected input the pass relies on is absent.
    #[error("missing input '{0}'")]
    MissingInput(String),

    /// Plugin-defined failure.
    #[error("{0}")]
    Failed(String),
}

/// A frame could not be completed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// Resolution failed; no pass ran.
    #[error("graph is invalid: {0}")]
    GraphInvalid(#[from] StructuralError),

    /// A pass failed; passes after it in the order did not run.
    #[error("pass '{pass}' failed: {source}")]
    PassFailed {
        pass: String,
        #[source]
        source: PassError,
    },
}

impl ExecutionError {
    /// Name of the failing pass, if a pass failed.
    pub fn failed_pass(&self) -> Option<&str> {
        match self {
            Self::PassFailed { pass, .. } => Some(pass),
            Self::GraphInvalid(_) => None,
        }
    }
}

/// Any error produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

//! Render graph model.
//!
//! A [`RenderGraph`] owns named pass instances, the edges that bind output
//! ports to input ports, and the set of marked outputs the caller observes
//! after each frame.
//!
//! # Construction
//!
//! Every mutation is validated synchronously. A rejected mutation returns a
//! [`ConstructionError`] and leaves the graph exactly as it was:
//!
//! ```ignore
//! let mut graph = RenderGraph::new("TestPathTracer");
//! let registry = PassRegistry::global();
//! graph.create_pass(registry, "GBufferRT", "G", &Properties::new())?;
//! graph.create_pass(registry, "PathTracer", "P", &Properties::new())?;
//! graph.create_pass(registry, "AccumulatePass", "Acc", &Properties::new())?;
//! graph.add_edge("G.vbuffer", "P.vbuffer")?;
//! graph.add_edge("P.color", "Acc.input")?;
//! graph.mark_output("Acc.output")?;
//! ```
//!
//! # Execution
//!
//! Resolution is deferred until the next [`execute`](RenderGraph::execute)
//! and cached until the next structural mutation:
//!
//! ```ignore
//! let outputs = graph.execute(&scene)?;
//! let color = outputs.get("Acc.output");
//! ```

use lantern_core::scene::{SceneBinding, SceneUpdates};

use crate::compiler::{self, CompiledGraph};
use crate::error::{ConstructionError, ExecutionError, StructuralError};
use crate::executor::{Executor, ExecutorConfig, FrameOutputs, FrameRequest};
use crate::pass::{PassInstance, PortDesc, PortDirection, PortRef};
use crate::registry::PassRegistry;
use crate::resources::{ResourcePlan, ResourcePool};
use crate::types::{Extent2d, ParamValue, Properties};

/// Handle to a pass in the render graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the `RenderGraph` that created it and until a pass is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named pass stored in a graph.
#[derive(Debug)]
pub(crate) struct PassNode {
    pub name: String,
    pub instance: PassInstance,
}

/// A binding from an output port to an input port of another pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub(crate) src: PortRef,
    pub(crate) dst: PortRef,
}

impl Edge {
    /// Producing output port.
    pub fn src(&self) -> &PortRef {
        &self.src
    }

    /// Consuming input port.
    pub fn dst(&self) -> &PortRef {
        &self.dst
    }
}

/// Resolution state of a graph.
///
/// ```text
/// Unresolved --execute--> Resolved --execute--> Executing --> Resolved
///      ^                      |
///      +------ mutation ------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphState {
    /// Changed since the last resolution.
    Unresolved,
    /// Resolution is cached and valid.
    Resolved,
    /// A frame is running.
    Executing,
}

/// The render graph describes how passes feed each other every frame.
#[derive(Debug)]
pub struct RenderGraph {
    name: String,
    passes: Vec<PassNode>,
    edges: Vec<Edge>,
    outputs: Vec<PortRef>,
    state: GraphState,
    compiled: Option<CompiledGraph>,
    executor: Executor,
}

impl RenderGraph {
    /// Create an empty graph with the default executor configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ExecutorConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ExecutorConfig) -> Self {
        Self {
            name: name.into(),
            passes: Vec::new(),
            edges: Vec::new(),
            outputs: Vec::new(),
            state: GraphState::Unresolved,
            compiled: None,
            executor: Executor::new(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a configured pass under a unique name.
    ///
    /// Names must be non-empty and must not contain `.`, which separates pass
    /// and port in port paths.
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        instance: PassInstance,
    ) -> Result<PassHandle, ConstructionError> {
        let name = name.into();
        if name.is_empty() || name.contains('.') {
            return Err(ConstructionError::InvalidPassName { name });
        }
        if self.find_pass(&name).is_some() {
            return Err(ConstructionError::DuplicateName { name });
        }

        log::debug!(
            "RenderGraph '{}': added pass {name} ({})",
            self.name,
            instance.type_name()
        );
        let handle = PassHandle::new(self.passes.len() as u32);
        self.passes.push(PassNode { name, instance });
        self.invalidate();
        Ok(handle)
    }

    /// Create a pass through `registry` and add it.
    pub fn create_pass(
        &mut self,
        registry: &PassRegistry,
        type_name: &str,
        name: impl Into<String>,
        props: &Properties,
    ) -> Result<PassHandle, ConstructionError> {
        let name = name.into();
        if self.find_pass(&name).is_some() {
            return Err(ConstructionError::DuplicateName { name });
        }
        let instance = registry.create(type_name, props)?;
        self.add_pass(name, instance)
    }

    /// Remove a pass with every edge and marked output touching it.
    pub fn remove_pass(&mut self, name: &str) -> Result<PassInstance, ConstructionError> {
        let index = self
            .find_pass(name)
            .ok_or_else(|| ConstructionError::UnknownPass {
                name: name.to_string(),
            })?;

        self.edges
            .retain(|edge| edge.src.pass != name && edge.dst.pass != name);
        self.outputs.retain(|port| port.pass != name);
        let node = self.passes.remove(index);
        log::debug!("RenderGraph '{}': removed pass {name}", self.name);
        self.invalidate();
        Ok(node.instance)
    }

    /// Bind output `src` to input `dst`, both written `"Pass.port"`.
    ///
    /// Cycles are not detected here; they are reported when the graph is
    /// resolved.
    pub fn add_edge(&mut self, src: &str, dst: &str) -> Result<(), ConstructionError> {
        let src = PortRef::parse(src)?;
        let dst = PortRef::parse(dst)?;
        let src_port = self.find_port(&src)?;
        let dst_port = self.find_port(&dst)?;

        if src.pass == dst.pass {
            return Err(ConstructionError::SelfEdge { pass: src.pass });
        }
        if !src_port.direction.is_output() {
            return Err(ConstructionError::DirectionMismatch {
                port: src,
                expected: PortDirection::Output,
            });
        }
        if !dst_port.direction.is_input() {
            return Err(ConstructionError::DirectionMismatch {
                port: dst,
                expected: PortDirection::Input,
            });
        }
        if let Some(existing) = self.incoming_edge(&dst) {
            return Err(ConstructionError::PortAlreadyBound {
                bound_to: existing.src.clone(),
                port: dst,
            });
        }
        if !src_port.kind.is_compatible_with(dst_port.kind) {
            return Err(ConstructionError::TypeMismatch {
                src_kind: src_port.kind,
                dst_kind: dst_port.kind,
                src,
                dst,
            });
        }

        log::debug!("RenderGraph '{}': edge {src} -> {dst}", self.name);
        self.edges.push(Edge { src, dst });
        self.invalidate();
        Ok(())
    }

    /// Remove the edge from `src` to `dst`.
    pub fn remove_edge(&mut self, src: &str, dst: &str) -> Result<(), ConstructionError> {
        let src = PortRef::parse(src)?;
        let dst = PortRef::parse(dst)?;
        let position = self
            .edges
            .iter()
            .position(|edge| edge.src == src && edge.dst == dst)
            .ok_or_else(|| ConstructionError::EdgeNotFound {
                src: src.clone(),
                dst: dst.clone(),
            })?;

        self.edges.remove(position);
        log::debug!("RenderGraph '{}': removed edge {src} -> {dst}", self.name);
        self.invalidate();
        Ok(())
    }

    /// Mark an output for observation after each frame.
    ///
    /// Returns `false` if the port was already marked.
    pub fn mark_output(&mut self, path: &str) -> Result<bool, ConstructionError> {
        let port = PortRef::parse(path)?;
        let is_output = self
            .find_port(&port)
            .is_ok_and(|desc| desc.direction.is_output());
        if !is_output {
            return Err(ConstructionError::UnknownPort { port });
        }
        if self.outputs.contains(&port) {
            return Ok(false);
        }

        log::debug!("RenderGraph '{}': marked {port}", self.name);
        self.outputs.push(port);
        self.invalidate();
        Ok(true)
    }

    /// Stop observing an output. Returns `false` if it was not marked.
    pub fn unmark_output(&mut self, path: &str) -> Result<bool, ConstructionError> {
        let port = PortRef::parse(path)?;
        let Some(position) = self.outputs.iter().position(|marked| *marked == port) else {
            return Ok(false);
        };
        self.outputs.remove(position);
        self.invalidate();
        Ok(true)
    }

    /// Change one option of a pass.
    ///
    /// The value is validated against the pass type's schema. If the new
    /// configuration drops a port that an edge or marked output refers to,
    /// the change is reverted and [`ConstructionError::UnknownPort`] returned.
    pub fn set_pass_property(
        &mut self,
        pass: &str,
        option: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), ConstructionError> {
        let index = self
            .find_pass(pass)
            .ok_or_else(|| ConstructionError::UnknownPass {
                name: pass.to_string(),
            })?;

        let previous = self.passes[index].instance.properties().clone();
        self.passes[index].instance.set_property(option, value.into())?;

        if let Some(port) = self.dangling_port(pass) {
            self.passes[index].instance.apply_properties(previous)?;
            return Err(ConstructionError::UnknownPort { port });
        }

        self.invalidate();
        Ok(())
    }

    /// First edge endpoint or marked output on `pass` that no longer exists.
    fn dangling_port(&self, pass: &str) -> Option<PortRef> {
        let exists = |port: &PortRef, output: bool| {
            self.find_port(port).is_ok_and(|desc| {
                if output {
                    desc.direction.is_output()
                } else {
                    desc.direction.is_input()
                }
            })
        };

        for edge in &self.edges {
            if edge.src.pass == pass && !exists(&edge.src, true) {
                return Some(edge.src.clone());
            }
            if edge.dst.pass == pass && !exists(&edge.dst, false) {
                return Some(edge.dst.clone());
            }
        }
        self.outputs
            .iter()
            .find(|port| port.pass == pass && !exists(port, true))
            .cloned()
    }

    /// Force re-resolution and re-planning before the next frame.
    pub fn invalidate(&mut self) {
        self.state = GraphState::Unresolved;
        self.compiled = None;
        self.executor.invalidate();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn find_pass(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|node| node.name == name)
    }

    fn find_port(&self, port: &PortRef) -> Result<&PortDesc, ConstructionError> {
        self.find_pass(&port.pass)
            .and_then(|index| self.passes[index].instance.port(&port.port))
            .ok_or_else(|| ConstructionError::UnknownPort { port: port.clone() })
    }

    /// Look up a pass by name.
    pub fn pass(&self, name: &str) -> Option<&PassInstance> {
        self.find_pass(name).map(|index| &self.passes[index].instance)
    }

    pub fn handle(&self, name: &str) -> Option<PassHandle> {
        self.find_pass(name).map(|index| PassHandle::new(index as u32))
    }

    pub fn pass_name(&self, handle: PassHandle) -> Option<&str> {
        self.passes.get(handle.index()).map(|node| node.name.as_str())
    }

    /// Passes in insertion order.
    pub fn passes(&self) -> impl Iterator<Item = (&str, &PassInstance)> {
        self.passes
            .iter()
            .map(|node| (node.name.as_str(), &node.instance))
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Marked outputs in marking order.
    pub fn marked_outputs(&self) -> &[PortRef] {
        &self.outputs
    }

    pub fn is_marked(&self, port: &PortRef) -> bool {
        self.outputs.contains(port)
    }

    /// The edge arriving at an input port, if bound.
    pub fn incoming_edge(&self, port: &PortRef) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.dst == *port)
    }

    /// Edges leaving an output port.
    pub fn outgoing_edges<'a>(&'a self, port: &'a PortRef) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |edge| edge.src == *port)
    }

    // ========================================================================
    // Resolution and execution
    // ========================================================================

    /// Resolve the graph, reusing the cached result when nothing changed.
    pub fn compile(&mut self) -> Result<&CompiledGraph, StructuralError> {
        let compiled = match self.compiled.take() {
            Some(compiled) => compiled,
            None => {
                let compiled = compiler::compile(&self.passes, &self.edges)?;
                self.state = GraphState::Resolved;
                compiled
            }
        };
        Ok(self.compiled.insert(compiled))
    }

    /// Pass names in execution order.
    pub fn execution_order(&mut self) -> Result<Vec<String>, StructuralError> {
        self.compile()?;
        Ok(self
            .compiled
            .iter()
            .flat_map(|compiled| compiled.pass_order())
            .map(|handle| self.passes[handle.index()].name.clone())
            .collect())
    }

    /// Run one frame against `scene`.
    ///
    /// Resolves first if needed; resolution failures are reported as
    /// [`ExecutionError::GraphInvalid`]. A failing pass aborts the frame and
    /// leaves the graph intact for another attempt.
    pub fn execute(&mut self, scene: &SceneBinding) -> Result<FrameOutputs<'_>, ExecutionError> {
        lantern_core::profile_function!();
        self.compile()?;
        let Some(compiled) = self.compiled.as_ref() else {
            return Ok(FrameOutputs::default());
        };

        self.state = GraphState::Executing;
        let result = self.executor.run_frame(FrameRequest {
            passes: &mut self.passes,
            compiled,
            marked: &self.outputs,
            scene,
        });
        self.state = GraphState::Resolved;
        result?;

        Ok(self.executor.frame_outputs(&self.outputs).unwrap_or_default())
    }

    /// Marked outputs of the last completed frame.
    ///
    /// `None` before the first frame, after a failed frame and after any
    /// mutation or resize.
    pub fn outputs(&self) -> Option<FrameOutputs<'_>> {
        if self.state != GraphState::Resolved {
            return None;
        }
        self.executor.frame_outputs(&self.outputs)
    }

    /// Change the frame resolution.
    ///
    /// All storage is released and every accumulating pass restarts.
    pub fn resize(&mut self, width: u32, height: u32) {
        let extent = Extent2d::new(width, height);
        if !self.executor.resize(extent) {
            return;
        }
        log::info!("RenderGraph '{}': resized to {extent}", self.name);
        self.reset_accumulation();
    }

    pub fn resolution(&self) -> Extent2d {
        self.executor.resolution()
    }

    /// Forward scene change notifications to every pass.
    pub fn on_scene_updates(&mut self, updates: SceneUpdates) {
        if updates.is_empty() {
            return;
        }
        for node in &mut self.passes {
            node.instance.on_scene_updates(updates);
        }
    }

    /// Request an accumulation reset on one pass.
    ///
    /// Returns `false` if the pass does not accumulate.
    pub fn request_reset(&mut self, pass: &str) -> Result<bool, ConstructionError> {
        let index = self
            .find_pass(pass)
            .ok_or_else(|| ConstructionError::UnknownPass {
                name: pass.to_string(),
            })?;
        Ok(self.passes[index].instance.request_reset())
    }

    /// Request an accumulation reset on every accumulating pass.
    ///
    /// Returns the number of passes affected.
    pub fn reset_accumulation(&mut self) -> usize {
        self.passes
            .iter_mut()
            .map(|node| node.instance.request_reset())
            .filter(|&reset| reset)
            .count()
    }

    pub fn executor_config(&self) -> &ExecutorConfig {
        self.executor.config()
    }

    /// Change the memory budget. Takes effect on the next allocation.
    pub fn set_memory_budget(&mut self, budget: Option<u64>) {
        self.executor.set_memory_budget(budget);
    }

    /// Storage plan of the last frame, if still valid.
    pub fn resource_plan(&self) -> Option<&ResourcePlan> {
        self.executor.plan()
    }

    pub fn resource_pool(&self) -> &ResourcePool {
        self.executor.pool()
    }

    /// Frames started so far.
    pub fn frame_index(&self) -> u64 {
        self.executor.frame_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    fn pathtracer_graph() -> RenderGraph {
        let registry = PassRegistry::global();
        let mut graph = RenderGraph::with_config(
            "test",
            ExecutorConfig::default().with_resolution(Extent2d::new(8, 6)),
        );
        graph
            .create_pass(registry, "GBufferRT", "G", &Properties::new())
            .unwrap();
        graph
            .create_pass(registry, "PathTracer", "P", &Properties::new())
            .unwrap();
        graph
            .create_pass(registry, "AccumulatePass", "Acc", &Properties::new())
            .unwrap();
        graph.add_edge("G.vbuffer", "P.vbuffer").unwrap();
        graph.add_edge("G.viewW", "P.viewW").unwrap();
        graph.add_edge("P.color", "Acc.input").unwrap();
        graph.mark_output("Acc.output").unwrap();
        graph
    }

    #[test]
    fn test_add_pass() {
        let mut graph = RenderGraph::new("test");
        let handle = graph
            .create_pass(PassRegistry::global(), "GBufferRT", "G", &Properties::new())
            .unwrap();
        assert_eq!(graph.pass_count(), 1);
        assert_eq!(graph.pass_name(handle), Some("G"));
        assert_eq!(graph.pass("G").map(|p| p.type_name()), Some("GBufferRT"));
        assert_eq!(graph.state(), GraphState::Unresolved);
    }

    #[test]
    fn test_duplicate_name() {
        let mut graph = pathtracer_graph();
        let err = graph
            .create_pass(PassRegistry::global(), "PathTracer", "P", &Properties::new())
            .unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateName { name: "P".into() });
        assert_eq!(graph.pass_count(), 3);
    }

    #[test]
    fn test_invalid_pass_name() {
        let mut graph = RenderGraph::new("test");
        for name in ["", "a.b"] {
            let err = graph
                .create_pass(PassRegistry::global(), "GBufferRT", name, &Properties::new())
                .unwrap_err();
            assert!(matches!(err, ConstructionError::InvalidPassName { .. }));
        }
    }

    #[test]
    fn test_edge_validation_order() {
        let mut graph = pathtracer_graph();
        assert!(matches!(
            graph.add_edge("G", "P.vbuffer"),
            Err(ConstructionError::MalformedPortPath { .. })
        ));
        assert!(matches!(
            graph.add_edge("G.missing", "P.vbuffer"),
            Err(ConstructionError::UnknownPort { .. })
        ));
        assert!(matches!(
            graph.add_edge("Acc.output", "Acc.input"),
            Err(ConstructionError::SelfEdge { .. })
        ));
        assert_eq!(
            graph.add_edge("P.vbuffer", "Acc.input"),
            Err(ConstructionError::DirectionMismatch {
                port: PortRef::new("P", "vbuffer"),
                expected: PortDirection::Output,
            })
        );
        assert_eq!(
            graph.add_edge("G.posW", "P.color"),
            Err(ConstructionError::DirectionMismatch {
                port: PortRef::new("P", "color"),
                expected: PortDirection::Input,
            })
        );
        assert!(matches!(
            graph.add_edge("G.posW", "Acc.input"),
            Err(ConstructionError::PortAlreadyBound { .. })
        ));
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_type_mismatch() {
        let mut graph = pathtracer_graph();
        graph.remove_edge("G.viewW", "P.viewW").unwrap();
        assert_eq!(
            graph.add_edge("G.depth", "P.viewW"),
            Err(ConstructionError::TypeMismatch {
                src: PortRef::new("G", "depth"),
                src_kind: ResourceKind::Depth,
                dst: PortRef::new("P", "viewW"),
                dst_kind: ResourceKind::Color,
            })
        );
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = pathtracer_graph();
        graph.remove_edge("G.viewW", "P.viewW").unwrap();
        assert!(graph.incoming_edge(&PortRef::new("P", "viewW")).is_none());
        assert!(matches!(
            graph.remove_edge("G.viewW", "P.viewW"),
            Err(ConstructionError::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn test_mark_output_is_idempotent() {
        let mut graph = pathtracer_graph();
        assert_eq!(graph.mark_output("Acc.output"), Ok(false));
        assert_eq!(graph.marked_outputs().len(), 1);
        assert_eq!(graph.mark_output("P.color"), Ok(true));
        assert_eq!(graph.marked_outputs().len(), 2);
    }

    #[test]
    fn test_mark_input_is_rejected() {
        let mut graph = pathtracer_graph();
        assert!(matches!(
            graph.mark_output("Acc.input"),
            Err(ConstructionError::UnknownPort { .. })
        ));
    }

    #[test]
    fn test_unmark_output() {
        let mut graph = pathtracer_graph();
        assert_eq!(graph.unmark_output("Acc.output"), Ok(true));
        assert_eq!(graph.unmark_output("Acc.output"), Ok(false));
        assert!(graph.marked_outputs().is_empty());
    }

    #[test]
    fn test_remove_pass_drops_edges_and_marks() {
        let mut graph = pathtracer_graph();
        let removed = graph.remove_pass("Acc").unwrap();
        assert_eq!(removed.type_name(), "AccumulatePass");
        assert_eq!(graph.edges().len(), 2);
        assert!(graph.marked_outputs().is_empty());
        assert!(matches!(
            graph.remove_pass("Acc"),
            Err(ConstructionError::UnknownPass { .. })
        ));
    }

    #[test]
    fn test_resolution_is_cached() {
        let mut graph = pathtracer_graph();
        assert_eq!(graph.execution_order().unwrap(), ["G", "P", "Acc"]);
        assert_eq!(graph.state(), GraphState::Resolved);

        graph.mark_output("P.color").unwrap();
        assert_eq!(graph.state(), GraphState::Unresolved);
        assert_eq!(graph.execution_order().unwrap(), ["G", "P", "Acc"]);
    }

    #[test]
    fn test_rejected_mutation_keeps_resolution() {
        let mut graph = pathtracer_graph();
        graph.compile().unwrap();
        let _ = graph.add_edge("G.posW", "Acc.input");
        assert_eq!(graph.state(), GraphState::Resolved);
    }

    #[test]
    fn test_set_pass_property() {
        let mut graph = pathtracer_graph();
        graph.set_pass_property("Acc", "maxFrameCount", 16).unwrap();
        assert_eq!(
            graph.pass("Acc").and_then(|p| p.properties().get_int("maxFrameCount")),
            Some(16)
        );
        assert!(matches!(
            graph.set_pass_property("Acc", "precisionMode", "Half"),
            Err(ConstructionError::InvalidParameter { .. })
        ));
        assert!(matches!(
            graph.set_pass_property("Nope", "enabled", false),
            Err(ConstructionError::UnknownPass { .. })
        ));
    }

    #[test]
    fn test_execute_and_outputs() {
        let mut graph = pathtracer_graph();
        let scene = SceneBinding::empty();
        {
            let outputs = graph.execute(&scene).unwrap();
            assert_eq!(outputs.len(), 1);
            let color = outputs.get("Acc.output").unwrap();
            assert_eq!(color.extent(), Extent2d::new(8, 6));
        }
        assert!(graph.outputs().is_some());
        assert_eq!(graph.frame_index(), 1);

        graph.resize(4, 4);
        assert!(graph.outputs().is_none());
        let outputs = graph.execute(&scene).unwrap();
        assert_eq!(outputs.get_index(0).map(|(_, r)| r.extent()), Some(Extent2d::new(4, 4)));
    }

    #[test]
    fn test_request_reset() {
        let mut graph = pathtracer_graph();
        assert_eq!(graph.request_reset("Acc"), Ok(true));
        assert_eq!(graph.request_reset("G"), Ok(false));
        assert_eq!(graph.reset_accumulation(), 1);
    }
}

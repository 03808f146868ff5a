//! Per-frame execution.
//!
//! The [`Executor`] owns everything that lives across frames but is not part
//! of the graph's structure: the storage pool, the current storage plan, the
//! frame counter and the identity of the last bound scene.
//!
//! A frame runs in four steps:
//!
//! 1. **Scene binding** - A scene with a new identity is handed to every pass
//! 2. **Planning** - The storage plan is rebuilt if it was invalidated
//! 3. **Pass execution** - Each pass takes its output storage out of the
//!    pool, borrows its inputs and runs; outputs go back to the pool
//! 4. **Collection** - Marked outputs are exposed as [`FrameOutputs`]
//!
//! A failing pass aborts the frame. Storage already taken is returned to the
//! pool so the next frame starts from a consistent state.

use lantern_core::scene::{SceneBinding, SceneFlags, SceneId};
use lantern_core::{frame_mark, profile_plot, profile_scope};

use crate::compiler::CompiledGraph;
use crate::error::{ExecutionError, PassError};
use crate::graph::{PassHandle, PassNode};
use crate::pass::{FrameInfo, InputBinding, OutputBinding, PassContext, PortDirection, PortRef, RefreshFlags};
use crate::resources::{PlanInput, PlannedResource, Resource, ResourcePlan, ResourcePool, SlotKey};
use crate::types::Extent2d;

/// Executor options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Upper bound on bytes held by the storage pool.
    pub memory_budget: Option<u64>,
    /// Share storage between resources with disjoint lifetimes and skip
    /// unused optional outputs.
    pub allow_aliasing: bool,
    /// Initial frame resolution.
    pub resolution: Extent2d,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            memory_budget: None,
            allow_aliasing: true,
            resolution: Extent2d::new(1280, 720),
        }
    }
}

impl ExecutorConfig {
    pub fn with_resolution(mut self, resolution: Extent2d) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_memory_budget(mut self, budget: Option<u64>) -> Self {
        self.memory_budget = budget;
        self
    }

    pub fn with_aliasing(mut self, allow: bool) -> Self {
        self.allow_aliasing = allow;
        self
    }
}

pub(crate) struct FrameRequest<'a> {
    pub passes: &'a mut [PassNode],
    pub compiled: &'a CompiledGraph,
    pub marked: &'a [PortRef],
    pub scene: &'a SceneBinding,
}

/// Runs resolved graphs frame by frame.
#[derive(Debug)]
pub struct Executor {
    config: ExecutorConfig,
    pool: ResourcePool,
    plan: Option<ResourcePlan>,
    frame_index: u64,
    bound_scene: Option<SceneId>,
    last_frame_complete: bool,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            pool: ResourcePool::new(config.memory_budget),
            config,
            plan: None,
            frame_index: 0,
            bound_scene: None,
            last_frame_complete: false,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn resolution(&self) -> Extent2d {
        self.config.resolution
    }

    /// Frames started so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn plan(&self) -> Option<&ResourcePlan> {
        self.plan.as_ref()
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn set_memory_budget(&mut self, budget: Option<u64>) {
        self.config.memory_budget = budget;
        self.pool.set_budget(budget);
    }

    /// Drop the plan after a structural change.
    ///
    /// The scene is re-bound on the next frame so passes added since the
    /// last frame see it; re-binding the same scene does not reset
    /// accumulation.
    pub(crate) fn invalidate(&mut self) {
        self.plan = None;
        self.bound_scene = None;
        self.last_frame_complete = false;
    }

    /// Change the resolution, releasing all storage. Returns `false` if the
    /// resolution did not change.
    pub(crate) fn resize(&mut self, resolution: Extent2d) -> bool {
        if resolution == self.config.resolution {
            return false;
        }
        self.config.resolution = resolution;
        self.pool.clear();
        self.plan = None;
        self.last_frame_complete = false;
        true
    }

    pub(crate) fn run_frame(&mut self, request: FrameRequest<'_>) -> Result<(), ExecutionError> {
        profile_scope!("run_frame");
        let FrameRequest {
            passes,
            compiled,
            marked,
            scene,
        } = request;

        self.last_frame_complete = false;
        self.frame_index += 1;

        if self.bound_scene != Some(scene.id()) {
            log::info!("Executor: binding scene '{}' ({:?})", scene.name(), scene.id());
            for node in passes.iter_mut() {
                node.instance.set_scene(scene);
            }
            let mut ports_changed = false;
            for node in passes.iter_mut() {
                ports_changed |= node.instance.refresh_ports();
            }
            if ports_changed {
                self.plan = None;
            }
            self.bound_scene = Some(scene.id());
        }

        let aliasing =
            self.config.allow_aliasing && !scene.flags().contains(SceneFlags::DONT_OPTIMIZE_GRAPH);
        let plan = match self.plan.take() {
            Some(plan) if plan.is_aliasing() == aliasing => plan,
            _ => {
                let plan = ResourcePlan::build(PlanInput {
                    passes: &*passes,
                    compiled,
                    marked,
                    resolution: self.config.resolution,
                    aliasing,
                });
                self.pool.retain_plan(&plan);
                profile_plot!("plan_bytes", plan.total_bytes());
                plan
            }
        };

        let result = self.run_passes(&plan, passes, compiled, scene);
        self.plan = Some(plan);
        result?;

        self.last_frame_complete = true;
        profile_plot!("pool_bytes", self.pool.allocated_bytes());
        frame_mark!();
        Ok(())
    }

    fn run_passes(
        &mut self,
        plan: &ResourcePlan,
        passes: &mut [PassNode],
        compiled: &CompiledGraph,
        scene: &SceneBinding,
    ) -> Result<(), ExecutionError> {
        let frame = FrameInfo {
            index: self.frame_index,
            resolution: self.config.resolution,
        };
        let mut refresh = RefreshFlags::empty();

        for &handle in compiled.pass_order() {
            profile_scope!("run_pass");
            let PassNode { name, instance } = &mut passes[handle.index()];
            log::trace!("Executor: frame {} running {name} ({})", frame.index, instance.type_name());

            let (slots, mut outputs) = self
                .take_outputs(plan, handle, compiled)
                .map_err(|source| ExecutionError::PassFailed {
                    pass: name.clone(),
                    source,
                })?;

            let result = {
                let inputs: Vec<InputBinding<'_>> = compiled
                    .inputs(handle)
                    .iter()
                    .filter_map(|input| {
                        let planned = plan.resource(&input.source)?;
                        Some(InputBinding {
                            port: input.port.as_str(),
                            resource: self.pool.get(&planned.slot)?,
                        })
                    })
                    .collect();
                let mut ctx = PassContext::new(name.as_str(), frame, scene, &inputs, &mut outputs, &mut refresh);
                instance.execute(&mut ctx)
            };

            for (slot, binding) in slots.iter().zip(outputs) {
                self.pool.restore(slot, binding.resource);
            }
            result.map_err(|source| {
                log::debug!("Executor: {name} failed: {source}");
                ExecutionError::PassFailed {
                    pass: name.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Take output storage for one pass out of the pool.
    ///
    /// On failure everything taken so far is returned.
    fn take_outputs(
        &mut self,
        plan: &ResourcePlan,
        handle: PassHandle,
        compiled: &CompiledGraph,
    ) -> Result<(Vec<SlotKey>, Vec<OutputBinding>), PassError> {
        let mut slots = Vec::new();
        let mut outputs = Vec::new();

        for planned in plan.produced_by(handle) {
            match self.take_output(plan, compiled, planned) {
                Ok(resource) => {
                    slots.push(planned.slot.clone());
                    outputs.push(OutputBinding {
                        port: planned.port.port.clone(),
                        resource,
                    });
                }
                Err(err) => {
                    for (slot, binding) in slots.iter().zip(outputs) {
                        self.pool.restore(slot, binding.resource);
                    }
                    return Err(err);
                }
            }
        }
        Ok((slots, outputs))
    }

    /// In-place ports start with a copy of their upstream data, or zeros
    /// when unbound.
    fn take_output(
        &mut self,
        plan: &ResourcePlan,
        compiled: &CompiledGraph,
        planned: &PlannedResource,
    ) -> Result<Resource, PassError> {
        let mut resource = self.pool.take(&planned.slot, planned.desc)?;
        if planned.direction != PortDirection::InputOutput {
            return Ok(resource);
        }

        let upstream = compiled
            .inputs(planned.producer)
            .iter()
            .find(|input| input.port == planned.port.port)
            .and_then(|input| plan.resource(&input.source))
            .and_then(|source| self.pool.get(&source.slot));
        let copied = match upstream {
            Some(source) => resource.copy_from(source),
            None => {
                resource.clear();
                Ok(())
            }
        };
        match copied {
            Ok(()) => Ok(resource),
            Err(err) => {
                self.pool.restore(&planned.slot, resource);
                Err(err)
            }
        }
    }

    /// Marked outputs of the last completed frame.
    pub(crate) fn frame_outputs<'a>(&'a self, marked: &'a [PortRef]) -> Option<FrameOutputs<'a>> {
        if !self.last_frame_complete {
            return None;
        }
        let plan = self.plan.as_ref()?;
        let entries = marked
            .iter()
            .filter_map(|port| {
                let planned = plan.resource(port)?;
                Some((port, self.pool.get(&planned.slot)?))
            })
            .collect();
        Some(FrameOutputs { entries })
    }
}

/// Data at each marked output after a completed frame.
///
/// Entries follow marking order. The borrow ends with the next mutable use
/// of the graph.
#[derive(Debug, Clone, Default)]
pub struct FrameOutputs<'a> {
    entries: Vec<(&'a PortRef, &'a Resource)>,
}

impl<'a> FrameOutputs<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a PortRef, &'a Resource)> {
        self.entries.iter().copied()
    }

    /// Output by `"Pass.port"` path.
    pub fn get(&self, path: &str) -> Option<&'a Resource> {
        let (pass, port) = path.split_once('.')?;
        self.entries
            .iter()
            .find(|(marked, _)| marked.pass == pass && marked.port == port)
            .map(|(_, resource)| *resource)
    }

    pub fn get_port(&self, port: &PortRef) -> Option<&'a Resource> {
        self.entries
            .iter()
            .find(|(marked, _)| *marked == port)
            .map(|(_, resource)| *resource)
    }

    /// Output by marking order.
    pub fn get_index(&self, index: usize) -> Option<(&'a PortRef, &'a Resource)> {
        self.entries.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = ExecutorConfig::default()
            .with_resolution(Extent2d::new(64, 32))
            .with_memory_budget(Some(1 << 20))
            .with_aliasing(false);
        assert_eq!(config.resolution, Extent2d::new(64, 32));
        assert_eq!(config.memory_budget, Some(1 << 20));
        assert!(!config.allow_aliasing);
    }

    #[test]
    fn test_resize_releases_storage() {
        let mut executor = Executor::new(ExecutorConfig::default());
        assert!(!executor.resize(Extent2d::new(1280, 720)));
        assert!(executor.resize(Extent2d::new(640, 360)));
        assert_eq!(executor.resolution(), Extent2d::new(640, 360));
        assert_eq!(executor.pool().allocated_bytes(), 0);
        assert!(executor.frame_outputs(&[]).is_none());
    }

    #[test]
    fn test_budget_follows_config() {
        let mut executor = Executor::new(ExecutorConfig::default().with_memory_budget(Some(64)));
        assert_eq!(executor.pool().budget(), Some(64));
        executor.set_memory_budget(None);
        assert_eq!(executor.pool().budget(), None);
        assert_eq!(executor.config().memory_budget, None);
    }
}

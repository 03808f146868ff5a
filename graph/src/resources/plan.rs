//! Resource lifetime planning.
//!
//! Every output port that needs storage becomes a [`PlannedResource`] with a
//! lifetime interval `[first_use, last_use]` measured in execution steps:
//! `first_use` is the producing step, `last_use` the last step that reads it.
//!
//! Storage slots are then handed out greedily in execution order. A slot is
//! returned to the free list after the last step that reads its resource, so
//! a later resource with the same description may reuse it. This is safe
//! because every reader of the earlier resource has already run, and a pass's
//! own inputs are still live while its outputs are allocated.
//!
//! Exceptions:
//!
//! - Marked outputs are live until the end of the frame so the caller can read them
//! - Persistent outputs get a dedicated slot that survives across frames
//! - Optional outputs nobody reads or observes get no storage at all
//!
//! With aliasing disabled every resource gets its own slot and nothing is elided.

use std::collections::HashMap;

use crate::compiler::CompiledGraph;
use crate::graph::{PassHandle, PassNode};
use crate::pass::{PortDirection, PortRef};
use crate::types::{Extent2d, ResourceDesc};

/// How long a resource's storage must stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceLifetime {
    /// Free after the last consumer runs.
    Transient,
    /// Marked as a graph output; valid until the end of the frame.
    Observed,
    /// Retained across frames.
    Persistent,
}

/// Identifies a storage slot in the [`ResourcePool`](super::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// Shared per-frame slot.
    Transient(u32),
    /// Dedicated slot owned by one output port.
    Persistent(PortRef),
}

/// One output's storage assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResource {
    pub producer: PassHandle,
    pub port: PortRef,
    /// `InputOutput` resources start from a copy of their upstream data.
    pub direction: PortDirection,
    pub desc: ResourceDesc,
    /// Step that produces the resource.
    pub first_use: usize,
    /// Last step that reads it. Observed and persistent resources extend to
    /// the end of the frame.
    pub last_use: usize,
    pub lifetime: ResourceLifetime,
    pub slot: SlotKey,
}

pub(crate) struct PlanInput<'a> {
    pub passes: &'a [PassNode],
    pub compiled: &'a CompiledGraph,
    pub marked: &'a [PortRef],
    pub resolution: Extent2d,
    pub aliasing: bool,
}

/// Storage assignment for every output of a resolved graph.
#[derive(Debug, Clone, Default)]
pub struct ResourcePlan {
    resources: Vec<PlannedResource>,
    by_port: HashMap<PortRef, usize>,
    transient_slots: Vec<ResourceDesc>,
    elided: Vec<PortRef>,
    aliasing: bool,
    resolution: Extent2d,
}

impl ResourcePlan {
    pub(crate) fn build(input: PlanInput<'_>) -> Self {
        let order = input.compiled.pass_order();
        let frame_end = order.len().saturating_sub(1);

        // Steps reading each output.
        let mut readers: HashMap<PortRef, Vec<usize>> = HashMap::new();
        for (step, handle) in order.iter().enumerate() {
            for resolved in input.compiled.inputs(*handle) {
                readers.entry(resolved.source.clone()).or_default().push(step);
            }
        }

        let mut plan = Self {
            aliasing: input.aliasing,
            resolution: input.resolution,
            ..Default::default()
        };

        for (step, handle) in order.iter().enumerate() {
            let node = &input.passes[handle.index()];
            for port in node.instance.ports().iter().filter(|p| p.direction.is_output()) {
                let port_ref = PortRef::new(node.name.as_str(), port.name.as_str());
                let observed = input.marked.contains(&port_ref);
                let port_readers = readers.get(&port_ref);

                if input.aliasing && port.is_optional() && !observed && port_readers.is_none() {
                    log::trace!("ResourcePlan: eliding unused optional output {port_ref}");
                    plan.elided.push(port_ref);
                    continue;
                }

                let lifetime = if port.is_persistent() {
                    ResourceLifetime::Persistent
                } else if observed {
                    ResourceLifetime::Observed
                } else {
                    ResourceLifetime::Transient
                };
                let last_use = match lifetime {
                    ResourceLifetime::Transient => port_readers
                        .and_then(|steps| steps.iter().max().copied())
                        .unwrap_or(step),
                    _ => frame_end,
                };
                let slot = match lifetime {
                    ResourceLifetime::Persistent => SlotKey::Persistent(port_ref.clone()),
                    _ => SlotKey::Transient(u32::MAX),
                };

                plan.by_port.insert(port_ref.clone(), plan.resources.len());
                plan.resources.push(PlannedResource {
                    producer: *handle,
                    port: port_ref,
                    direction: port.direction,
                    desc: ResourceDesc::new(port.kind, port.extent.resolve(input.resolution)),
                    first_use: step,
                    last_use,
                    lifetime,
                    slot,
                });
            }
        }

        plan.assign_slots();
        log::debug!(
            "ResourcePlan: {} resources in {} transient slots ({} elided, aliasing {})",
            plan.resources.len(),
            plan.transient_slots.len(),
            plan.elided.len(),
            if plan.aliasing { "on" } else { "off" }
        );
        plan
    }

    fn assign_slots(&mut self) {
        // Resources are already ordered by first_use.
        let mut free: Vec<u32> = Vec::new();
        let mut step = 0;

        for index in 0..self.resources.len() {
            let first_use = self.resources[index].first_use;
            if self.aliasing {
                // Release everything whose last reader ran before this step.
                while step < first_use {
                    self.release_at(step, &mut free);
                    step += 1;
                }
            }

            let resource = &self.resources[index];
            if resource.lifetime == ResourceLifetime::Persistent {
                continue;
            }
            let desc = resource.desc;
            let reused = free
                .iter()
                .position(|slot| self.transient_slots[*slot as usize] == desc)
                .map(|position| free.remove(position));
            let slot = reused.unwrap_or_else(|| {
                self.transient_slots.push(desc);
                (self.transient_slots.len() - 1) as u32
            });
            self.resources[index].slot = SlotKey::Transient(slot);
        }
    }

    fn release_at(&self, step: usize, free: &mut Vec<u32>) {
        for resource in &self.resources {
            if resource.lifetime == ResourceLifetime::Transient && resource.last_use == step {
                if let SlotKey::Transient(slot) = resource.slot {
                    if slot != u32::MAX {
                        free.push(slot);
                    }
                }
            }
        }
        free.sort_unstable();
    }

    /// All planned resources in production order.
    pub fn resources(&self) -> &[PlannedResource] {
        &self.resources
    }

    /// Planned resource for an output port, if it has storage.
    pub fn resource(&self, port: &PortRef) -> Option<&PlannedResource> {
        self.by_port.get(port).map(|index| &self.resources[*index])
    }

    /// Resources produced by `pass`, in port declaration order.
    pub fn produced_by(&self, pass: PassHandle) -> impl Iterator<Item = &PlannedResource> {
        self.resources.iter().filter(move |r| r.producer == pass)
    }

    /// Optional outputs that were given no storage.
    pub fn elided(&self) -> &[PortRef] {
        &self.elided
    }

    pub fn is_elided(&self, port: &PortRef) -> bool {
        self.elided.contains(port)
    }

    /// Descriptions of the shared per-frame slots.
    pub fn transient_slots(&self) -> &[ResourceDesc] {
        &self.transient_slots
    }

    /// Number of distinct storage slots, persistent ones included.
    pub fn slot_count(&self) -> usize {
        self.transient_slots.len() + self.persistent_count()
    }

    fn persistent_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| r.lifetime == ResourceLifetime::Persistent)
            .count()
    }

    /// Total bytes the plan needs once every slot is allocated.
    pub fn total_bytes(&self) -> u64 {
        let transient: u64 = self.transient_slots.iter().map(|d| d.byte_size()).sum();
        let persistent: u64 = self
            .resources
            .iter()
            .filter(|r| r.lifetime == ResourceLifetime::Persistent)
            .map(|r| r.desc.byte_size())
            .sum();
        transient + persistent
    }

    /// Whether two outputs were assigned the same storage slot.
    pub fn shares_storage(&self, a: &PortRef, b: &PortRef) -> bool {
        match (self.resource(a), self.resource(b)) {
            (Some(a), Some(b)) => a.slot == b.slot,
            _ => false,
        }
    }

    pub fn is_aliasing(&self) -> bool {
        self.aliasing
    }

    /// Frame resolution the plan was built for.
    pub fn resolution(&self) -> Extent2d {
        self.resolution
    }
}

//! Slot storage with an optional memory budget.

use std::collections::HashMap;

use crate::error::PassError;
use crate::pass::PortRef;
use crate::types::ResourceDesc;

use super::plan::{ResourcePlan, SlotKey};
use super::Resource;

/// Owns the storage behind every [`SlotKey`].
///
/// Storage is allocated lazily the first time a slot is taken and kept for
/// later frames as long as its description does not change. Executing passes
/// take their output storage out of the pool and hand it back afterwards,
/// which lets inputs be borrowed from the pool at the same time.
#[derive(Debug, Default)]
pub struct ResourcePool {
    budget: Option<u64>,
    transient: Vec<Option<Resource>>,
    persistent: HashMap<PortRef, Option<Resource>>,
    allocated_bytes: u64,
    peak_bytes: u64,
}

impl ResourcePool {
    /// Create an empty pool. `budget` caps total allocated bytes.
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    pub fn set_budget(&mut self, budget: Option<u64>) {
        self.budget = budget;
    }

    /// Bytes currently backing slots.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    /// Highest value `allocated_bytes` has reached.
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes
    }

    fn entry(&mut self, key: &SlotKey) -> &mut Option<Resource> {
        match key {
            SlotKey::Transient(index) => {
                let index = *index as usize;
                if self.transient.len() <= index {
                    self.transient.resize_with(index + 1, || None);
                }
                &mut self.transient[index]
            }
            SlotKey::Persistent(port) => self.persistent.entry(port.clone()).or_default(),
        }
    }

    /// Take the storage for `key`, allocating it if needed.
    ///
    /// Existing storage with a different description is released first.
    /// Storage is not cleared; the previous contents of a reused slot remain.
    pub fn take(&mut self, key: &SlotKey, desc: ResourceDesc) -> Result<Resource, PassError> {
        if let Some(resource) = self.entry(key).take() {
            if resource.desc() == desc {
                return Ok(resource);
            }
            log::trace!(
                "ResourcePool: slot {key:?} changed from {:?} to {desc:?}",
                resource.desc()
            );
            self.allocated_bytes -= resource.byte_size();
        }

        let requested = desc.byte_size();
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(self.allocated_bytes);
            if requested > available {
                return Err(PassError::ResourceExhausted {
                    requested,
                    available,
                });
            }
        }

        log::trace!("ResourcePool: allocating {key:?} ({desc:?}, {requested} bytes)");
        self.allocated_bytes += requested;
        self.peak_bytes = self.peak_bytes.max(self.allocated_bytes);
        Ok(Resource::new(desc))
    }

    /// Return storage previously obtained from [`take`](Self::take).
    pub fn restore(&mut self, key: &SlotKey, resource: Resource) {
        *self.entry(key) = Some(resource);
    }

    /// Storage currently held for `key`.
    pub fn get(&self, key: &SlotKey) -> Option<&Resource> {
        match key {
            SlotKey::Transient(index) => self.transient.get(*index as usize)?.as_ref(),
            SlotKey::Persistent(port) => self.persistent.get(port)?.as_ref(),
        }
    }

    /// Drop storage the plan no longer references.
    pub fn retain_plan(&mut self, plan: &ResourcePlan) {
        let slot_count = plan.transient_slots().len();
        for resource in self.transient.drain(slot_count.min(self.transient.len())..).flatten() {
            self.allocated_bytes -= resource.byte_size();
        }

        let mut freed = 0;
        self.persistent.retain(|port, storage| {
            let keep = plan
                .resource(port)
                .is_some_and(|r| r.slot == SlotKey::Persistent(port.clone()));
            if !keep {
                freed += storage.as_ref().map_or(0, Resource::byte_size);
            }
            keep
        });
        self.allocated_bytes -= freed;
    }

    /// Release all storage.
    pub fn clear(&mut self) {
        self.transient.clear();
        self.persistent.clear();
        self.allocated_bytes = 0;
    }
}

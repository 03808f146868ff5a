//! Frame resources.
//!
//! - [`Resource`] - CPU storage for one typed 2D resource
//! - [`ResourcePlan`] - Liveness-based assignment of resources to storage slots
//! - [`ResourcePool`] - Slot storage with an optional memory budget
//!
//! The plan is computed once per resolved graph. The pool keeps storage alive
//! across frames so steady-state execution allocates nothing.

mod plan;
mod pool;
mod storage;

pub use plan::{PlannedResource, ResourceLifetime, ResourcePlan, SlotKey};
pub(crate) use plan::PlanInput;
pub use pool::ResourcePool;
pub use storage::Resource;

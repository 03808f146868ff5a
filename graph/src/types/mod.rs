//! Value types shared by the graph model, the resource planner and passes.
//!
//! - [`ResourceKind`] / [`Extent2d`] / [`PortExtent`] / [`ResourceDesc`] - Typed data descriptions
//! - [`ParamValue`] / [`Properties`] - Pass configuration values

mod resource;
mod value;

pub use resource::{Extent2d, PortExtent, ResourceDesc, ResourceKind};
pub use value::{ParamValue, Properties};

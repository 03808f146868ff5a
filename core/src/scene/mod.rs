//! Scene collaborator types.
//!
//! The render graph never interprets scene contents. It receives an opaque
//! [`SceneBinding`] at execution time, forwards it to passes, and reacts to
//! change notifications expressed as [`SceneUpdates`].
//!
//! - [`SceneBinding`] - Cheap, cloneable handle to loaded scene data
//! - [`SceneDescriptor`] / [`SceneCamera`] - What a loader produces
//! - [`SceneFlags`] - Builder options the core honors opaquely
//! - [`SceneUpdates`] - Per-frame change notifications
//! - [`SceneLoader`] - The loader contract (`load_scene(path, flags)`)

mod binding;
mod flags;
mod loader;

pub use binding::{SceneBinding, SceneCamera, SceneDescriptor, SceneId};
pub use flags::{SceneFlags, SceneUpdates};
pub use loader::{SceneError, SceneLoader};

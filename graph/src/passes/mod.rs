//! Built-in pass library.
//!
//! CPU reference implementations that run end to end without a GPU:
//!
//! | Type                   | Produces                                            |
//! |------------------------|-----------------------------------------------------|
//! | `GBufferRT`            | Visibility and surface data for primary, reflected and refracted hits |
//! | `PathTracer`           | Noisy radiance estimate from a visibility buffer    |
//! | `AccumulatePass`       | Progressive average of one color input              |
//! | `NeuralAccumulatePass` | Progressive average of every G-buffer channel       |
//! | `LightSample`          | Per-light emitter samples                           |
//!
//! Geometry comes from a small analytic scene derived from the bound
//! [`SceneBinding`](lantern_core::scene::SceneBinding); see [`scene_model`].

mod accumulate;
mod gbuffer;
mod light_sample;
mod neural_accumulate;
mod path_tracer;
pub mod sampling;
pub mod scene_model;

pub use accumulate::AccumulatePass;
pub use gbuffer::GBufferRt;
pub use light_sample::LightSample;
pub use neural_accumulate::{NeuralAccumulatePass, CHANNELS as NEURAL_CHANNELS};
pub use path_tracer::PathTracer;

use crate::pass::{ParamSchema, PassBody};
use crate::types::Properties;

/// Tag for each built-in pass type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinPass {
    GBufferRt,
    PathTracer,
    Accumulate,
    NeuralAccumulate,
    LightSample,
}

impl BuiltinPass {
    pub const ALL: [BuiltinPass; 5] = [
        BuiltinPass::GBufferRt,
        BuiltinPass::PathTracer,
        BuiltinPass::Accumulate,
        BuiltinPass::NeuralAccumulate,
        BuiltinPass::LightSample,
    ];

    /// Registered type name.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::GBufferRt => GBufferRt::TYPE_NAME,
            Self::PathTracer => PathTracer::TYPE_NAME,
            Self::Accumulate => AccumulatePass::TYPE_NAME,
            Self::NeuralAccumulate => NeuralAccumulatePass::TYPE_NAME,
            Self::LightSample => LightSample::TYPE_NAME,
        }
    }

    pub fn schema(self) -> &'static [ParamSchema] {
        match self {
            Self::GBufferRt => GBufferRt::SCHEMA,
            Self::PathTracer => PathTracer::SCHEMA,
            Self::Accumulate => AccumulatePass::SCHEMA,
            Self::NeuralAccumulate => NeuralAccumulatePass::SCHEMA,
            Self::LightSample => LightSample::SCHEMA,
        }
    }

    /// Build the body from validated properties.
    pub fn instantiate(self, props: &Properties) -> PassBody {
        match self {
            Self::GBufferRt => PassBody::GBufferRt(GBufferRt::from_properties(props)),
            Self::PathTracer => PassBody::PathTracer(PathTracer::from_properties(props)),
            Self::Accumulate => PassBody::Accumulate(AccumulatePass::from_properties(props)),
            Self::NeuralAccumulate => {
                PassBody::NeuralAccumulate(NeuralAccumulatePass::from_properties(props))
            }
            Self::LightSample => PassBody::LightSample(LightSample::from_properties(props)),
        }
    }
}

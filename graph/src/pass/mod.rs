//! Pass instances and the pass contract.
//!
//! A pass is a configured unit of work with typed ports. Built-in passes are
//! variants of [`PassBody`]; anything else plugs in through the
//! [`RenderPass`] trait via [`PassBody::Plugin`].
//!
//! # Lifecycle
//!
//! 1. The registry validates options against the type's [`ParamSchema`] list
//!    and builds the body from the complete [`Properties`]
//! 2. The body declares its ports through [`RenderPass::reflect`]
//! 3. Each frame the executor calls [`RenderPass::execute`] with a
//!    [`PassContext`] holding bound inputs and exclusively owned outputs
//!
//! Port declarations may depend on configuration and on the bound scene, so
//! they are re-read after every reconfiguration and scene change.

mod accumulation;
mod context;
mod port;
mod schema;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use lantern_core::scene::{SceneBinding, SceneUpdates};

pub use accumulation::{
    AccumulateStep, AccumulationSettings, Accumulator, OverflowMode, PrecisionMode,
};
pub use context::{FrameInfo, InputBinding, OutputBinding, PassContext, RefreshFlags};
pub use port::{PortDesc, PortDirection, PortFlags, PortRef};
pub use schema::{lookup, validate, ParamDefault, ParamKind, ParamSchema};

use crate::error::{ConstructionError, PassError};
use crate::passes::{AccumulatePass, GBufferRt, LightSample, NeuralAccumulatePass, PathTracer};
use crate::types::{ParamValue, Properties};

/// The pass contract.
pub trait RenderPass: Send + Sync + fmt::Debug {
    /// Declare ports for the current configuration and scene.
    fn reflect(&self) -> Vec<PortDesc>;

    /// Apply a complete, validated property set.
    ///
    /// On error the pass must be left in its previous configuration.
    fn configure(&mut self, props: &Properties) -> Result<(), PassError>;

    /// Run one frame.
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError>;

    /// A scene was bound for the next frame. Port extents may change here.
    fn set_scene(&mut self, _scene: &SceneBinding) {}

    /// The scene reported changes.
    fn on_scene_updates(&mut self, _updates: SceneUpdates) {}

    /// Accumulation state, for passes that accumulate.
    fn accumulator(&self) -> Option<&Accumulator> {
        None
    }

    fn accumulator_mut(&mut self) -> Option<&mut Accumulator> {
        None
    }

    /// Allow downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Pass implementation: one of the built-ins, or a plugin.
#[derive(Debug)]
pub enum PassBody {
    GBufferRt(GBufferRt),
    PathTracer(PathTracer),
    Accumulate(AccumulatePass),
    NeuralAccumulate(NeuralAccumulatePass),
    LightSample(LightSample),
    Plugin(Box<dyn RenderPass>),
}

impl PassBody {
    pub fn as_render_pass(&self) -> &dyn RenderPass {
        match self {
            Self::GBufferRt(pass) => pass,
            Self::PathTracer(pass) => pass,
            Self::Accumulate(pass) => pass,
            Self::NeuralAccumulate(pass) => pass,
            Self::LightSample(pass) => pass,
            Self::Plugin(pass) => pass.as_ref(),
        }
    }

    pub fn as_render_pass_mut(&mut self) -> &mut dyn RenderPass {
        match self {
            Self::GBufferRt(pass) => pass,
            Self::PathTracer(pass) => pass,
            Self::Accumulate(pass) => pass,
            Self::NeuralAccumulate(pass) => pass,
            Self::LightSample(pass) => pass,
            Self::Plugin(pass) => pass.as_mut(),
        }
    }

    pub fn is_plugin(&self) -> bool {
        matches!(self, Self::Plugin(_))
    }

    pub fn as_accumulate(&self) -> Option<&AccumulatePass> {
        match self {
            Self::Accumulate(pass) => Some(pass),
            _ => None,
        }
    }

    pub fn as_neural_accumulate(&self) -> Option<&NeuralAccumulatePass> {
        match self {
            Self::NeuralAccumulate(pass) => Some(pass),
            _ => None,
        }
    }

    pub fn as_light_sample(&self) -> Option<&LightSample> {
        match self {
            Self::LightSample(pass) => Some(pass),
            _ => None,
        }
    }

    /// Downcast a plugin body to its concrete type.
    pub fn as_plugin<T: RenderPass + 'static>(&self) -> Option<&T> {
        match self {
            Self::Plugin(pass) => pass.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// A configured pass as stored in a graph.
#[derive(Debug)]
pub struct PassInstance {
    type_name: String,
    schema: Arc<[ParamSchema]>,
    properties: Properties,
    ports: Vec<PortDesc>,
    body: PassBody,
}

impl PassInstance {
    pub(crate) fn new(
        type_name: impl Into<String>,
        schema: Arc<[ParamSchema]>,
        properties: Properties,
        body: PassBody,
    ) -> Self {
        let ports = body.as_render_pass().reflect();
        Self {
            type_name: type_name.into(),
            schema,
            properties,
            ports,
            body,
        }
    }

    /// Registered type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Complete, validated configuration.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn schema(&self) -> &[ParamSchema] {
        &self.schema
    }

    /// Declared ports, in declaration order.
    pub fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&PortDesc> {
        self.ports.iter().find(|port| port.name == name)
    }

    /// Ports edges may arrive at.
    pub fn inputs(&self) -> impl Iterator<Item = &PortDesc> {
        self.ports.iter().filter(|port| port.direction.is_input())
    }

    /// Ports edges may leave from.
    pub fn outputs(&self) -> impl Iterator<Item = &PortDesc> {
        self.ports.iter().filter(|port| port.direction.is_output())
    }

    pub fn body(&self) -> &PassBody {
        &self.body
    }

    /// Accumulation state, if the pass accumulates.
    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.body.as_render_pass().accumulator()
    }

    /// Request an accumulation reset. Returns `false` if the pass does not accumulate.
    pub(crate) fn request_reset(&mut self) -> bool {
        match self.body.as_render_pass_mut().accumulator_mut() {
            Some(accumulator) => {
                accumulator.request_reset();
                true
            }
            None => false,
        }
    }

    /// Change one option. Aliases are accepted with a warning.
    pub(crate) fn set_property(
        &mut self,
        name: &str,
        value: ParamValue,
    ) -> Result<(), ConstructionError> {
        let invalid = |reason: String| ConstructionError::InvalidParameter {
            pass_type: self.type_name.clone(),
            option: name.to_string(),
            reason,
        };
        let (entry, is_alias) =
            lookup(&self.schema, name).ok_or_else(|| invalid("unknown option".into()))?;
        entry.check(&value).map_err(invalid)?;
        if is_alias {
            log::warn!(
                "{}: '{name}' is deprecated, use '{}' instead",
                self.type_name,
                entry.name
            );
        }

        let mut properties = self.properties.clone();
        properties.set(entry.name, value);
        self.apply_properties(properties)
    }

    /// Replace the whole configuration.
    pub(crate) fn apply_properties(&mut self, properties: Properties) -> Result<(), ConstructionError> {
        self.body
            .as_render_pass_mut()
            .configure(&properties)
            .map_err(|err| ConstructionError::InvalidParameter {
                pass_type: self.type_name.clone(),
                option: String::new(),
                reason: err.to_string(),
            })?;
        self.properties = properties;
        self.ports = self.body.as_render_pass().reflect();
        Ok(())
    }

    /// Re-read port declarations. Returns `true` if they changed.
    pub(crate) fn refresh_ports(&mut self) -> bool {
        let ports = self.body.as_render_pass().reflect();
        if ports == self.ports {
            return false;
        }
        self.ports = ports;
        true
    }

    pub(crate) fn set_scene(&mut self, scene: &SceneBinding) {
        self.body.as_render_pass_mut().set_scene(scene);
    }

    pub(crate) fn on_scene_updates(&mut self, updates: SceneUpdates) {
        self.body.as_render_pass_mut().on_scene_updates(updates);
    }

    pub(crate) fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        self.body.as_render_pass_mut().execute(ctx)
    }
}

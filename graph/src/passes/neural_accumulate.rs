//! Accumulation of the full set of G-buffer channels.

use std::any::Any;

use lantern_core::scene::{SceneBinding, SceneUpdates};

use crate::error::PassError;
use crate::pass::{AccumulationSettings, Accumulator, ParamSchema, PassContext, PortDesc, RenderPass};
use crate::resources::Resource;
use crate::types::{Properties, ResourceKind};

use super::accumulate::{reconfigure, ACCUMULATION_SCHEMA};

/// Accumulated channels. Each input `name` produces `name_out`.
pub const CHANNELS: &[(&str, ResourceKind)] = &[
    ("color", ResourceKind::Color),
    ("posW", ResourceKind::Color),
    ("normW", ResourceKind::Color),
    ("viewW", ResourceKind::Color),
    ("diffRough", ResourceKind::Color),
    ("emissive", ResourceKind::Color),
    ("reflectMask", ResourceKind::Mask),
    ("reflectDirW", ResourceKind::Color),
    ("reflectPosW", ResourceKind::Color),
    ("reflectNormalW", ResourceKind::Color),
    ("reflectDiffRough", ResourceKind::Color),
    ("reflectEmissive", ResourceKind::Color),
    ("reflectDepth", ResourceKind::Depth),
    ("refractMask", ResourceKind::Mask),
    ("refractDirW", ResourceKind::Color),
    ("refractPosW", ResourceKind::Color),
    ("refractNormalW", ResourceKind::Color),
    ("refractDiffRough", ResourceKind::Color),
    ("refractEmissive", ResourceKind::Color),
    ("mixedMask", ResourceKind::Mask),
    ("mixedDirW", ResourceKind::Color),
    ("mixedPosW", ResourceKind::Color),
    ("mixedNormalW", ResourceKind::Color),
    ("mixedDiffRough", ResourceKind::Color),
    ("mixedEmissive", ResourceKind::Color),
];

/// Accumulates every connected channel with one shared frame counter.
///
/// Unconnected channels produce cleared outputs. If connected inputs
/// disagree in size the pass disables itself until reconfigured.
#[derive(Debug, Clone)]
pub struct NeuralAccumulatePass {
    settings: AccumulationSettings,
    accumulator: Accumulator,
    output_names: Vec<String>,
}

impl NeuralAccumulatePass {
    pub const TYPE_NAME: &'static str = "NeuralAccumulatePass";

    pub const SCHEMA: &'static [ParamSchema] = ACCUMULATION_SCHEMA;

    pub fn from_properties(props: &Properties) -> Self {
        Self {
            settings: AccumulationSettings::default().merged(props),
            accumulator: Accumulator::new(),
            output_names: CHANNELS
                .iter()
                .map(|(name, _)| format!("{name}_out"))
                .collect(),
        }
    }

    pub fn settings(&self) -> &AccumulationSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }
}

impl RenderPass for NeuralAccumulatePass {
    fn reflect(&self) -> Vec<PortDesc> {
        let inputs = CHANNELS
            .iter()
            .map(|(name, kind)| PortDesc::input(*name, *kind).optional());
        let outputs = CHANNELS
            .iter()
            .zip(&self.output_names)
            .map(|((_, kind), name)| PortDesc::output(name.as_str(), *kind).optional().persistent());
        inputs.chain(outputs).collect()
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        reconfigure(&mut self.settings, &mut self.accumulator, props);
        Ok(())
    }

    fn set_scene(&mut self, scene: &SceneBinding) {
        self.accumulator.bind_scene(scene.id());
    }

    fn on_scene_updates(&mut self, updates: SceneUpdates) {
        if self.settings.auto_reset && updates.invalidates_accumulation() {
            self.accumulator.request_reset();
        }
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        if self.settings.auto_reset && !ctx.refresh_flags().is_empty() {
            self.accumulator.request_reset();
        }

        let inputs: Vec<Option<&Resource>> =
            CHANNELS.iter().map(|(name, _)| ctx.input(name)).collect();
        let mut extents = inputs.iter().flatten().map(|input| input.extent());
        let extent = extents.next().unwrap_or(ctx.frame().resolution);
        if self.settings.enabled && extents.any(|other| other != extent) {
            log::warn!(
                "{}: input sizes don't match, accumulation disabled",
                ctx.pass_name()
            );
            self.settings.enabled = false;
        }
        if !self.settings.enabled
            && inputs
                .iter()
                .flatten()
                .any(|input| input.extent() != extent)
        {
            for (_, output) in ctx.outputs_mut() {
                output.clear();
            }
            return Ok(());
        }

        let step = self.accumulator.begin_frame(&self.settings, extent);
        for (channel, (input, name)) in inputs.iter().zip(&self.output_names).enumerate() {
            let Some(output) = ctx.output(name) else {
                continue;
            };
            match input {
                Some(input) => {
                    self.accumulator
                        .apply(&self.settings, step, channel, input, output)?
                }
                None => output.clear(),
            }
        }
        self.accumulator.end_frame(step);
        Ok(())
    }

    fn accumulator(&self) -> Option<&Accumulator> {
        Some(&self.accumulator)
    }

    fn accumulator_mut(&mut self) -> Option<&mut Accumulator> {
        Some(&mut self.accumulator)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_channel_has_an_output() {
        let pass = NeuralAccumulatePass::from_properties(&Properties::new());
        let ports = pass.reflect();
        assert_eq!(ports.len(), CHANNELS.len() * 2);
        let out = ports.iter().find(|port| port.name == "reflectDepth_out").unwrap();
        assert_eq!(out.kind, ResourceKind::Depth);
        assert!(out.is_persistent());
        assert!(out.is_optional());
        assert!(ports.iter().all(|port| !port.is_required_input()));
    }

    #[test]
    fn test_deprecated_alias_configures_enabled() {
        let props = crate::pass::validate(
            NeuralAccumulatePass::TYPE_NAME,
            NeuralAccumulatePass::SCHEMA,
            &Properties::new().with("enableAccumulation", false),
        )
        .unwrap();
        let pass = NeuralAccumulatePass::from_properties(&props);
        assert!(!pass.is_enabled());
    }
}

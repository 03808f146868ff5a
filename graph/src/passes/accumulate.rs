//! Temporal accumulation of a single color input.

use std::any::Any;

use lantern_core::scene::{SceneBinding, SceneUpdates};

use crate::error::PassError;
use crate::pass::{
    AccumulationSettings, Accumulator, OverflowMode, ParamSchema, PassContext, PortDesc,
    PrecisionMode, RenderPass,
};
use crate::types::{Properties, ResourceKind};

/// Options shared by every accumulating pass type.
pub(crate) const ACCUMULATION_SCHEMA: &[ParamSchema] = &[
    ParamSchema::bool("enabled", true).with_alias("enableAccumulation"),
    ParamSchema::choice("precisionMode", PrecisionMode::NAMES, "Single"),
    ParamSchema::bool("autoReset", true),
    ParamSchema::non_negative("maxFrameCount", 0),
    ParamSchema::choice("overflowMode", OverflowMode::NAMES, "Stop"),
];

impl AccumulationSettings {
    /// Read settings from validated properties, falling back to `self`.
    pub(crate) fn merged(self, props: &Properties) -> Self {
        Self {
            enabled: props.get_bool("enabled").unwrap_or(self.enabled),
            auto_reset: props.get_bool("autoReset").unwrap_or(self.auto_reset),
            precision: props
                .get_str("precisionMode")
                .and_then(PrecisionMode::from_name)
                .unwrap_or(self.precision),
            max_frame_count: props.get_u32("maxFrameCount").unwrap_or(self.max_frame_count),
            overflow: props
                .get_str("overflowMode")
                .and_then(OverflowMode::from_name)
                .unwrap_or(self.overflow),
        }
    }
}

/// Reconfigure, requesting a reset when anything affecting the result changed.
pub(crate) fn reconfigure(
    settings: &mut AccumulationSettings,
    accumulator: &mut Accumulator,
    props: &Properties,
) {
    let updated = settings.merged(props);
    if updated != *settings {
        if updated.enabled != settings.enabled {
            log::debug!(
                "Accumulation {}",
                if updated.enabled { "enabled" } else { "disabled" }
            );
        }
        accumulator.request_reset();
    }
    *settings = updated;
}

/// Progressive averaging of `input` into the persistent `output`.
#[derive(Debug, Clone)]
pub struct AccumulatePass {
    settings: AccumulationSettings,
    accumulator: Accumulator,
}

impl AccumulatePass {
    pub const TYPE_NAME: &'static str = "AccumulatePass";

    pub const SCHEMA: &'static [ParamSchema] = ACCUMULATION_SCHEMA;

    pub fn from_properties(props: &Properties) -> Self {
        Self {
            settings: AccumulationSettings::default().merged(props),
            accumulator: Accumulator::new(),
        }
    }

    pub fn settings(&self) -> &AccumulationSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }
}

impl RenderPass for AccumulatePass {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("input", ResourceKind::Color),
            PortDesc::output("output", ResourceKind::Color).persistent(),
        ]
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

        let input = ctx.require_input("input")?;
        let output = ctx
            .output("output")
            .ok_or_else(|| PassError::InvalidConfiguration("output has no storage".into()))?;

        let step = self.accumulator.begin_frame(&self.settings, input.extent());
        self.accumulator
            .apply(&self.settings, step, 0, input, output)?;
        self.accumulator.end_frame(step);
        log::trace!(
            "AccumulatePass: {step:?}, {} frames accumulated",
            self.accumulator.frame_count()
        );
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

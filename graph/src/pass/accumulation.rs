//! Temporal accumulation state shared by the accumulating passes.
//!
//! An [`Accumulator`] keeps per-channel running sums and a frame counter.
//! Each frame it decides on one [`AccumulateStep`] and applies it to every
//! channel the owning pass accumulates:
//!
//! | Situation                          | Step          | Output            | Counter        |
//! |------------------------------------|---------------|-------------------|----------------|
//! | `enabled == false`                 | `Passthrough` | input             | unchanged      |
//! | reset requested or extent changed  | `Restart`     | input             | 0              |
//! | counter reached `maxFrameCount`    | per overflow  | see below         | see below      |
//! | otherwise                          | `Add`         | running average   | +1             |
//!
//! Overflow modes once `maxFrameCount > 0` frames have been accumulated:
//!
//! - `Stop` - Output keeps its last value; the counter stays at the limit
//! - `Reset` - Sums are discarded and accumulation starts over with this frame
//! - `EMA` - Exponential moving average with weight `1 / maxFrameCount`

use std::fmt;

use lantern_core::scene::SceneId;

use crate::error::PassError;
use crate::resources::Resource;
use crate::types::Extent2d;

/// Numeric precision of the running sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionMode {
    /// 64-bit sums.
    Double,
    /// 32-bit sums.
    #[default]
    Single,
    /// 32-bit sums with Kahan compensation.
    SingleCompensated,
}

impl PrecisionMode {
    pub const NAMES: &'static [&'static str] = &["Double", "Single", "SingleCompensated"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Double" => Some(Self::Double),
            "Single" => Some(Self::Single),
            "SingleCompensated" => Some(Self::SingleCompensated),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Double => "Double",
            Self::Single => "Single",
            Self::SingleCompensated => "SingleCompensated",
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What happens once `maxFrameCount` frames have been accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowMode {
    #[default]
    Stop,
    Reset,
    Ema,
}

impl OverflowMode {
    pub const NAMES: &'static [&'static str] = &["Stop", "Reset", "EMA"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Stop" => Some(Self::Stop),
            "Reset" => Some(Self::Reset),
            "EMA" => Some(Self::Ema),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::Reset => "Reset",
            Self::Ema => "EMA",
        }
    }
}

/// Accumulation options, read from pass properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulationSettings {
    pub enabled: bool,
    pub auto_reset: bool,
    pub precision: PrecisionMode,
    /// Zero means unlimited.
    pub max_frame_count: u32,
    pub overflow: OverflowMode,
}

impl Default for AccumulationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_reset: true,
            precision: PrecisionMode::Single,
            max_frame_count: 0,
            overflow: OverflowMode::Stop,
        }
    }
}

/// Decision for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulateStep {
    /// Copy input to output, leave state alone.
    Passthrough,
    /// State was reset; output the input as-is.
    Restart,
    /// Keep the previous output.
    Hold,
    /// Add the frame; the average covers `count` frames.
    Add { count: u32 },
    /// Blend the frame in with weight `1 / window`.
    Ema { window: u32 },
}

#[derive(Debug, Clone, Default)]
enum ChannelSum {
    #[default]
    Empty,
    Single(Vec<f32>),
    Compensated { sum: Vec<f32>, compensation: Vec<f32> },
    Double(Vec<f64>),
}

impl ChannelSum {
    fn matches(&self, precision: PrecisionMode, len: usize) -> bool {
        match (self, precision) {
            (Self::Single(sum), PrecisionMode::Single) => sum.len() == len,
            (Self::Compensated { sum, .. }, PrecisionMode::SingleCompensated) => sum.len() == len,
            (Self::Double(sum), PrecisionMode::Double) => sum.len() == len,
            _ => false,
        }
    }

    fn zeroed(precision: PrecisionMode, len: usize) -> Self {
        match precision {
            PrecisionMode::Single => Self::Single(vec![0.0; len]),
            PrecisionMode::SingleCompensated => Self::Compensated {
                sum: vec![0.0; len],
                compensation: vec![0.0; len],
            },
            PrecisionMode::Double => Self::Double(vec![0.0; len]),
        }
    }

    /// Add `input` and write `sum / count` into `output`.
    fn add(&mut self, input: &[f32], output: &mut [f32], count: u32) {
        match self {
            Self::Empty => {}
            Self::Single(sum) => {
                let inv = 1.0 / count as f32;
                for ((s, x), out) in sum.iter_mut().zip(input).zip(output) {
                    *s += *x;
                    *out = *s * inv;
                }
            }
            Self::Compensated { sum, compensation } => {
                let inv = 1.0 / count as f32;
                for (((s, c), x), out) in sum
                    .iter_mut()
                    .zip(compensation.iter_mut())
                    .zip(input)
                    .zip(output)
                {
                    let y = *x - *c;
                    let t = *s + y;
                    *c = (t - *s) - y;
                    *s = t;
                    *out = *s * inv;
                }
            }
            Self::Double(sum) => {
                let inv = 1.0 / count as f64;
                for ((s, x), out) in sum.iter_mut().zip(input).zip(output) {
                    *s += *x as f64;
                    *out = (*s * inv) as f32;
                }
            }
        }
    }

    /// Replace one frame's worth of the sum with `input`.
    ///
    /// The sum holds `window` frames, so `sum / window` is the moving average.
    fn blend(&mut self, input: &[f32], output: &mut [f32], window: u32) {
        match self {
            Self::Empty => {}
            Self::Single(sum) => {
                let w = window as f32;
                for ((s, x), out) in sum.iter_mut().zip(input).zip(output) {
                    *s += *x - *s / w;
                    *out = *s / w;
                }
            }
            Self::Compensated { sum, compensation } => {
                let w = window as f32;
                for (((s, c), x), out) in sum
                    .iter_mut()
                    .zip(compensation.iter_mut())
                    .zip(input)
                    .zip(output)
                {
                    let y = (*x - *s / w) - *c;
                    let t = *s + y;
                    *c = (t - *s) - y;
                    *s = t;
                    *out = *s / w;
                }
            }
            Self::Double(sum) => {
                let w = window as f64;
                for ((s, x), out) in sum.iter_mut().zip(input).zip(output) {
                    *s += *x as f64 - *s / w;
                    *out = (*s / w) as f32;
                }
            }
        }
    }
}

/// Running accumulation state for one pass.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    frame_count: u32,
    reset_requested: bool,
    extent: Option<Extent2d>,
    scene: Option<SceneId>,
    sums: Vec<ChannelSum>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames currently folded into the output.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Make the next accumulating frame start over.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    pub fn is_reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Note the bound scene. A change of scene requests a reset; the first
    /// binding does not.
    pub fn bind_scene(&mut self, scene: SceneId) {
        if self.scene.is_some_and(|previous| previous != scene) {
            log::debug!("Accumulator: scene changed, resetting");
            self.request_reset();
        }
        self.scene = Some(scene);
    }

    fn discard_sums(&mut self) {
        self.sums.iter_mut().for_each(|sum| *sum = ChannelSum::Empty);
        self.frame_count = 0;
    }

    /// Decide what this frame does. Call once per frame before [`apply`](Self::apply).
    pub fn begin_frame(&mut self, settings: &AccumulationSettings, extent: Extent2d) -> AccumulateStep {
        if !settings.enabled {
            return AccumulateStep::Passthrough;
        }

        if self.extent.is_some_and(|previous| previous != extent) {
            log::debug!("Accumulator: resolution changed to {extent}, resetting");
            self.reset_requested = true;
        }
        self.extent = Some(extent);

        if self.reset_requested {
            self.reset_requested = false;
            self.discard_sums();
            return AccumulateStep::Restart;
        }

        let max = settings.max_frame_count;
        if max > 0 && self.frame_count >= max {
            return match settings.overflow {
                OverflowMode::Stop => AccumulateStep::Hold,
                OverflowMode::Ema => AccumulateStep::Ema { window: max },
                OverflowMode::Reset => {
                    self.discard_sums();
                    AccumulateStep::Add { count: 1 }
                }
            };
        }

        AccumulateStep::Add {
            count: self.frame_count + 1,
        }
    }

    /// Apply `step` to one channel.
    ///
    /// Input and output must have the same extent and channel count.
    pub fn apply(
        &mut self,
        settings: &AccumulationSettings,
        step: AccumulateStep,
        channel: usize,
        input: &Resource,
        output: &mut Resource,
    ) -> Result<(), PassError> {
        if !input.desc().is_layout_compatible(&output.desc()) {
            return Err(PassError::InvalidConfiguration(format!(
                "accumulation input is {} {} but output is {} {}",
                input.extent(),
                input.kind(),
                output.extent(),
                output.kind()
            )));
        }

        if self.sums.len() <= channel {
            self.sums.resize_with(channel + 1, ChannelSum::default);
        }
        let sum = &mut self.sums[channel];
        let len = input.data().len();

        match step {
            AccumulateStep::Passthrough | AccumulateStep::Restart => output.copy_from(input)?,
            AccumulateStep::Hold => {}
            AccumulateStep::Add { count } => {
                if !sum.matches(settings.precision, len) {
                    *sum = ChannelSum::zeroed(settings.precision, len);
                }
                sum.add(input.data(), output.data_mut(), count);
            }
            AccumulateStep::Ema { window } => {
                if !sum.matches(settings.precision, len) {
                    // Nothing to blend with; seed the window from this frame.
                    *sum = ChannelSum::zeroed(settings.precision, len);
                    sum.add(input.data(), output.data_mut(), 1);
                    scale_sum(sum, window);
                } else {
                    sum.blend(input.data(), output.data_mut(), window);
                }
            }
        }
        Ok(())
    }

    /// Finish the frame started with [`begin_frame`](Self::begin_frame).
    pub fn end_frame(&mut self, step: AccumulateStep) {
        if let AccumulateStep::Add { count } = step {
            self.frame_count = count;
        }
    }
}

fn scale_sum(sum: &mut ChannelSum, factor: u32) {
    match sum {
        ChannelSum::Empty => {}
        ChannelSum::Single(values) => values.iter_mut().for_each(|v| *v *= factor as f32),
        ChannelSum::Compensated { sum, compensation } => {
            sum.iter_mut()
                .chain(compensation.iter_mut())
                .for_each(|v| *v *= factor as f32)
        }
        ChannelSum::Double(values) => values.iter_mut().for_each(|v| *v *= factor as f64),
    }
}

//! Light sample generation.

use std::any::Any;
use std::f32::consts::TAU;

use glam::Vec3;
use lantern_core::scene::SceneBinding;

use crate::error::PassError;
use crate::pass::{ParamSchema, PassContext, PortDesc, RenderPass};
use crate::types::{Properties, ResourceKind};

use super::sampling::SampleGenerator;

/// Writes `sampleCount` samples for each scene light.
///
/// Outputs are `sampleCount x lightCount` structured records. A
/// `lightCount` of zero takes the light count of the bound scene; any other
/// value is kept across scene bindings.
#[derive(Debug, Clone)]
pub struct LightSample {
    sample_count: u32,
    /// Configured `lightCount`; zero means "from the scene".
    configured_lights: u32,
    scene_lights: u32,
    scene_radius: f32,
}

impl LightSample {
    pub const TYPE_NAME: &'static str = "LightSample";

    pub const SCHEMA: &'static [ParamSchema] = &[
        ParamSchema::positive("sampleCount", 256),
        ParamSchema::non_negative("lightCount", 0),
    ];

    pub fn from_properties(props: &Properties) -> Self {
        Self {
            sample_count: props.get_u32("sampleCount").unwrap_or(256),
            configured_lights: props.get_u32("lightCount").unwrap_or(0),
            scene_lights: 0,
            scene_radius: 1.0,
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn light_count(&self) -> u32 {
        match self.configured_lights {
            0 => self.scene_lights,
            configured => configured,
        }
    }

    /// Emitter geometry for light `index`: a small disc on a ring around
    /// the scene, facing its center.
    fn light_frame(&self, index: u32) -> (Vec3, Vec3, Vec3) {
        let count = self.light_count().max(1) as f32;
        let angle = TAU * index as f32 / count;
        let center = Vec3::new(angle.cos(), 1.0, angle.sin()) * self.scene_radius * 2.0;
        let normal = (-center).normalize_or_zero();
        let hue = index as f32 / count;
        let emissive = Vec3::new(1.0, 0.6 + 0.4 * hue, 0.3 + 0.7 * (1.0 - hue)) * 5.0;
        (center, normal, emissive)
    }
}

impl RenderPass for LightSample {
    fn reflect(&self) -> Vec<PortDesc> {
        ["posW", "normW", "emissive"]
            .into_iter()
            .map(|name| {
                PortDesc::output(name, ResourceKind::Structured)
                    .optional()
                    .with_fixed_extent(self.sample_count, self.light_count())
            })
            .collect()
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        self.sample_count = props.get_u32("sampleCount").unwrap_or(self.sample_count);
        self.configured_lights = props.get_u32("lightCount").unwrap_or(self.configured_lights);
        Ok(())
    }

    fn set_scene(&mut self, scene: &SceneBinding) {
        self.scene_lights = scene.light_count();
        self.scene_radius = scene.bounds_radius();
        if self.configured_lights != 0 && self.configured_lights != self.scene_lights {
            log::debug!(
                "LightSample: keeping lightCount {} (scene has {})",
                self.configured_lights,
                self.scene_lights
            );
        }
        log::debug!(
            "LightSample: {} lights, scene radius {}",
            self.light_count(),
            self.scene_radius
        );
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let frame = ctx.frame().index;
        let seed = ctx.scene().seed();
        let disc_radius = self.scene_radius * 0.1;
        for (port, output) in ctx.outputs_mut() {
            for (sample, light, texel) in output.texels_mut() {
                let (center, normal, emissive) = self.light_frame(light);
                let value = match port {
                    "posW" => {
                        let mut rng = SampleGenerator::new(sample, light, frame, seed);
                        let (t, b) = normal.any_orthonormal_pair();
                        let r = rng.next_f32().sqrt() * disc_radius;
                        let phi = TAU * rng.next_f32();
                        (center + (t * phi.cos() + b * phi.sin()) * r).extend(1.0)
                    }
                    "normW" => normal.extend(0.0),
                    _ => emissive.extend(1.0),
                };
                texel.copy_from_slice(&value.to_array());
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extent2d, PortExtent};
    use lantern_core::scene::SceneDescriptor;

    fn scene_with_lights(light_count: u32) -> SceneBinding {
        SceneBinding::new(SceneDescriptor {
            light_count,
            ..Default::default()
        })
    }

    #[test]
    fn test_extent_follows_scene_lights() {
        let mut pass = LightSample::from_properties(&Properties::new().with("sampleCount", 16));
        assert_eq!(pass.reflect()[0].extent, PortExtent::Fixed(Extent2d::new(16, 0)));

        pass.set_scene(&scene_with_lights(5));
        assert_eq!(pass.light_count(), 5);
        assert_eq!(pass.reflect()[2].extent, PortExtent::Fixed(Extent2d::new(16, 5)));
    }

    #[test]
    fn test_configured_light_count_survives_rebinding() {
        let mut pass = LightSample::from_properties(
            &Properties::new().with("sampleCount", 16).with("lightCount", 2),
        );
        pass.set_scene(&scene_with_lights(5));
        pass.set_scene(&scene_with_lights(7));
        assert_eq!(pass.light_count(), 2);
        assert_eq!(pass.reflect()[0].extent, PortExtent::Fixed(Extent2d::new(16, 2)));

        // Back to zero follows the scene again.
        pass.configure(&Properties::new().with("lightCount", 0)).unwrap();
        assert_eq!(pass.light_count(), 7);
    }

    #[test]
    fn test_lights_face_the_scene() {
        let pass = LightSample {
            sample_count: 4,
            configured_lights: 3,
            scene_lights: 0,
            scene_radius: 1.0,
        };
        for index in 0..3 {
            let (center, normal, _) = pass.light_frame(index);
            assert!(center.dot(normal) < 0.0);
        }
    }
}

//! Ray-traced G-buffer.

use std::any::Any;

use glam::{Vec2, Vec3};
use lantern_core::scene::SceneBinding;

use crate::error::PassError;
use crate::pass::{ParamSchema, PassContext, PortDesc, RefreshFlags, RenderPass};
use crate::types::{Properties, ResourceKind};

use super::sampling::SamplePattern;
use super::scene_model::{reflect, Hit, SceneModel, MISS};

/// Writes primary-hit surface data, plus one reflected and one refracted
/// hit, for every pixel.
///
/// Only `vbuffer` is required downstream; every other channel is optional
/// and skipped when the graph does not need it.
#[derive(Debug, Clone)]
pub struct GBufferRt {
    max_bounces: u32,
    sample_pattern: SamplePattern,
    sample_count: u32,
    use_alpha_test: bool,
    adjust_shading_normals: bool,
    model: Option<SceneModel>,
    /// Set by `configure` when an option changed; raised on the next frame.
    options_changed: bool,
}

const OUTPUTS: &[(&str, ResourceKind)] = &[
    ("posW", ResourceKind::Color),
    ("normW", ResourceKind::Color),
    ("viewW", ResourceKind::Color),
    ("diffRough", ResourceKind::Color),
    ("emissive", ResourceKind::Color),
    ("depth", ResourceKind::Depth),
    ("mask", ResourceKind::Mask),
    ("reflectPosW", ResourceKind::Color),
    ("reflectDirW", ResourceKind::Color),
    ("reflectDiffRough", ResourceKind::Color),
    ("refractPosW", ResourceKind::Color),
    ("refractDirW", ResourceKind::Color),
    ("finalPosW", ResourceKind::Color),
    ("reflectDepth", ResourceKind::Depth),
];

/// Everything traced for one pixel.
#[derive(Debug, Clone, Copy)]
struct PixelSample {
    dir: Vec3,
    primary: Option<Hit>,
    reflect_dir: Vec3,
    reflected: Option<Hit>,
    refract_dir: Option<Vec3>,
    refracted: Option<Hit>,
    final_pos: Vec3,
    bounces: u32,
}

fn depth(hit: Option<&Hit>) -> f32 {
    hit.map_or(1.0, |hit| hit.t / (hit.t + 1.0))
}

fn point(hit: Option<&Hit>) -> [f32; 4] {
    hit.map_or([0.0; 4], |hit| hit.position.extend(1.0).to_array())
}

fn material(hit: Option<&Hit>) -> [f32; 4] {
    hit.map_or([0.0; 4], |hit| hit.albedo.extend(hit.roughness).to_array())
}

fn write(texel: &mut [f32], value: [f32; 4]) {
    let len = texel.len();
    texel.copy_from_slice(&value[..len]);
}

impl GBufferRt {
    pub const TYPE_NAME: &'static str = "GBufferRT";

    pub const SCHEMA: &'static [ParamSchema] = &[
        ParamSchema::non_negative("maxBounces", 3),
        ParamSchema::choice("samplePattern", SamplePattern::NAMES, "Center"),
        ParamSchema::positive("sampleCount", 16),
        ParamSchema::bool("useAlphaTest", true),
        ParamSchema::bool("adjustShadingNormals", true),
    ];

    pub fn from_properties(props: &Properties) -> Self {
        let mut pass = Self {
            max_bounces: 3,
            sample_pattern: SamplePattern::Center,
            sample_count: 16,
            use_alpha_test: true,
            adjust_shading_normals: true,
            model: None,
            options_changed: false,
        };
        pass.apply(props);
        pass
    }

    fn apply(&mut self, props: &Properties) {
        self.max_bounces = props.get_u32("maxBounces").unwrap_or(self.max_bounces);
        self.sample_pattern = props
            .get_str("samplePattern")
            .and_then(SamplePattern::from_name)
            .unwrap_or(self.sample_pattern);
        self.sample_count = props.get_u32("sampleCount").unwrap_or(self.sample_count);
        self.use_alpha_test = props.get_bool("useAlphaTest").unwrap_or(self.use_alpha_test);
        self.adjust_shading_normals = props
            .get_bool("adjustShadingNormals")
            .unwrap_or(self.adjust_shading_normals);
    }

    fn options(&self) -> (u32, SamplePattern, u32, bool, bool) {
        (
            self.max_bounces,
            self.sample_pattern,
            self.sample_count,
            self.use_alpha_test,
            self.adjust_shading_normals,
        )
    }

    pub fn sample_pattern(&self) -> SamplePattern {
        self.sample_pattern
    }

    fn trace(&self, model: &SceneModel, origin: Vec3, dir: Vec3) -> PixelSample {
        let mut primary = model.intersect(origin, dir, self.use_alpha_test);
        if let Some(hit) = primary.as_mut() {
            if self.adjust_shading_normals && hit.normal.dot(dir) > 0.0 {
                hit.normal = -hit.normal;
            }
        }

        let mut sample = PixelSample {
            dir,
            primary,
            reflect_dir: Vec3::ZERO,
            reflected: None,
            refract_dir: None,
            refracted: None,
            final_pos: primary.map_or(Vec3::ZERO, |hit| hit.position),
            bounces: 0,
        };
        let Some(hit) = primary else {
            return sample;
        };

        sample.reflect_dir = reflect(dir, hit.normal);
        if self.max_bounces > 0 {
            sample.reflected = model.intersect(
                hit.position + hit.normal * 1e-3,
                sample.reflect_dir,
                self.use_alpha_test,
            );
        }
        sample.refract_dir = model.refract(&hit, dir);
        if let Some(refract_dir) = sample.refract_dir {
            sample.refracted =
                model.intersect(hit.position - hit.normal * 1e-3, refract_dir, self.use_alpha_test);
        }

        // Follow the mirror path as far as the bounce budget allows.
        let (mut position, mut normal, mut ray_dir) = (hit.position, hit.normal, dir);
        while sample.bounces < self.max_bounces {
            ray_dir = reflect(ray_dir, normal);
            match model.intersect(position + normal * 1e-3, ray_dir, self.use_alpha_test) {
                Some(next) => {
                    position = next.position;
                    normal = next.normal;
                    sample.bounces += 1;
                }
                None => break,
            }
        }
        sample.final_pos = position;
        sample
    }

    fn value(port: &str, s: &PixelSample) -> [f32; 4] {
        let primary = s.primary.as_ref();
        match port {
            "vbuffer" => primary.map_or([MISS, 0.0, 0.0, 0.0], |hit| {
                [hit.instance as f32, hit.uv.x, hit.uv.y, hit.t]
            }),
            "posW" => point(primary),
            "normW" => primary.map_or([0.0; 4], |hit| hit.normal.extend(0.0).to_array()),
            "viewW" => (-s.dir).extend(0.0).to_array(),
            "diffRough" => material(primary),
            "emissive" => primary.map_or([0.0; 4], |hit| hit.emissive.extend(0.0).to_array()),
            "depth" => [depth(primary), 0.0, 0.0, 0.0],
            "mask" => [primary.map_or(0.0, |_| 1.0), 0.0, 0.0, 0.0],
            "reflectPosW" => point(s.reflected.as_ref()),
            "reflectDirW" => s.reflect_dir.extend(0.0).to_array(),
            "reflectDiffRough" => material(s.reflected.as_ref()),
            "reflectDepth" => [depth(s.reflected.as_ref()), 0.0, 0.0, 0.0],
            "refractPosW" => point(s.refracted.as_ref()),
            "refractDirW" => s.refract_dir.unwrap_or(Vec3::ZERO).extend(0.0).to_array(),
            "finalPosW" => s.final_pos.extend(s.bounces as f32).to_array(),
            _ => [0.0; 4],
        }
    }
}

impl RenderPass for GBufferRt {
    fn reflect(&self) -> Vec<PortDesc> {
        std::iter::once(PortDesc::output("vbuffer", ResourceKind::Visibility))
            .chain(
                OUTPUTS
                    .iter()
                    .map(|(name, kind)| PortDesc::output(*name, *kind).optional()),
            )
            .collect()
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        let before = self.options();
        self.apply(props);
        if self.options() != before {
            log::debug!("GBufferRT: options changed");
            self.options_changed = true;
        }
        Ok(())
    }

    fn set_scene(&mut self, scene: &SceneBinding) {
        self.model = Some(SceneModel::from_scene(scene));
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        if std::mem::take(&mut self.options_changed) {
            ctx.raise(RefreshFlags::RENDER_OPTIONS_CHANGED);
        }
        let frame = ctx.frame();
        let model = match &self.model {
            Some(model) => model.clone(),
            None => SceneModel::from_scene(ctx.scene()),
        };
        let extent = frame.resolution;
        let jitter: Vec2 = self
            .sample_pattern
            .offset(frame.index.saturating_sub(1), self.sample_count);

        let mut samples = Vec::with_capacity(extent.texel_count());
        for y in 0..extent.height {
            for x in 0..extent.width {
                let (origin, dir) = model.primary_ray(x, y, jitter, extent.width, extent.height);
                samples.push(self.trace(&model, origin, dir));
            }
        }

        for (port, resource) in ctx.outputs_mut() {
            let width = resource.extent().width as usize;
            for (x, y, texel) in resource.texels_mut() {
                let sample = &samples[y as usize * width + x as usize];
                write(texel, Self::value(port, sample));
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
    use crate::pass::validate;

    #[test]
    fn test_ports() {
        let pass = GBufferRt::from_properties(&Properties::new());
        let ports = pass.reflect();
        assert_eq!(ports.len(), 15);
        assert_eq!(ports[0].name, "vbuffer");
        assert!(!ports[0].is_optional());
        assert!(ports[1..].iter().all(|port| port.is_optional()));
        assert!(ports.iter().all(|port| port.direction.is_output()));
    }

    #[test]
    fn test_configure_reads_options() {
        let props = validate(
            GBufferRt::TYPE_NAME,
            GBufferRt::SCHEMA,
            &Properties::new()
                .with("samplePattern", "Stratified")
                .with("maxBounces", 2),
        )
        .unwrap();
        let pass = GBufferRt::from_properties(&props);
        assert_eq!(pass.sample_pattern(), SamplePattern::Stratified);
        assert_eq!(pass.max_bounces, 2);
        assert_eq!(pass.sample_count, 16);
    }

    #[test]
    fn test_miss_values() {
        let sample = PixelSample {
            dir: Vec3::Y,
            primary: None,
            reflect_dir: Vec3::ZERO,
            reflected: None,
            refract_dir: None,
            refracted: None,
            final_pos: Vec3::ZERO,
            bounces: 0,
        };
        assert_eq!(GBufferRt::value("vbuffer", &sample)[0], MISS);
        assert_eq!(GBufferRt::value("mask", &sample)[0], 0.0);
        assert_eq!(GBufferRt::value("depth", &sample)[0], 1.0);
        assert_eq!(GBufferRt::value("viewW", &sample), [0.0, -1.0, 0.0, 0.0]);
    }
}

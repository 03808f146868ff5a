//! Monte Carlo path tracer over the analytic scene.

use std::any::Any;
use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use lantern_core::scene::SceneBinding;

use crate::error::PassError;
use crate::pass::{ParamSchema, PassContext, PortDesc, RefreshFlags, RenderPass};
use crate::types::{Properties, ResourceKind};

use super::sampling::SampleGenerator;
use super::scene_model::{reflect, Hit, SceneModel, SPHERE};

/// Bounce budgets for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Budget {
    surface: u32,
    diffuse: u32,
    specular: u32,
    transmission: u32,
}

/// Estimates radiance from the primary hits in `vbuffer`.
///
/// Every frame draws `samplesPerPixel` new paths per pixel, so `color` is
/// noisy and meant to be accumulated. `primary` holds noise-free direct
/// lighting at the first hit and `albedo` the first-hit reflectance.
#[derive(Debug, Clone)]
pub struct PathTracer {
    samples_per_pixel: u32,
    budget: Budget,
    use_alpha_test: bool,
    model: Option<SceneModel>,
    options_changed: bool,
}

fn cosine_sample(normal: Vec3, u: Vec2) -> Vec3 {
    let (t, b) = normal.any_orthonormal_pair();
    let r = u.x.sqrt();
    let phi = 2.0 * PI * u.y;
    (t * r * phi.cos() + b * r * phi.sin() + normal * (1.0 - u.x).max(0.0).sqrt()).normalize()
}

impl PathTracer {
    pub const TYPE_NAME: &'static str = "PathTracer";

    pub const SCHEMA: &'static [ParamSchema] = &[
        ParamSchema::positive("samplesPerPixel", 1),
        ParamSchema::non_negative("maxSurfaceBounces", 10),
        ParamSchema::non_negative("maxDiffuseBounces", 3),
        ParamSchema::non_negative("maxSpecularBounces", 3),
        ParamSchema::non_negative("maxTransmissionBounces", 10),
        ParamSchema::bool("useAlphaTest", true),
    ];

    pub fn from_properties(props: &Properties) -> Self {
        let mut pass = Self {
            samples_per_pixel: 1,
            budget: Budget {
                surface: 10,
                diffuse: 3,
                specular: 3,
                transmission: 10,
            },
            use_alpha_test: true,
            model: None,
            options_changed: false,
        };
        pass.apply(props);
        pass
    }

    fn apply(&mut self, props: &Properties) {
        self.samples_per_pixel = props
            .get_u32("samplesPerPixel")
            .unwrap_or(self.samples_per_pixel);
        self.budget = Budget {
            surface: props.get_u32("maxSurfaceBounces").unwrap_or(self.budget.surface),
            diffuse: props.get_u32("maxDiffuseBounces").unwrap_or(self.budget.diffuse),
            specular: props.get_u32("maxSpecularBounces").unwrap_or(self.budget.specular),
            transmission: props
                .get_u32("maxTransmissionBounces")
                .unwrap_or(self.budget.transmission),
        };
        self.use_alpha_test = props.get_bool("useAlphaTest").unwrap_or(self.use_alpha_test);
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    fn direct(&self, model: &SceneModel, hit: &Hit) -> Vec3 {
        let n_dot_l = hit.normal.dot(model.sun_dir()).max(0.0);
        let sun = if n_dot_l > 0.0 && model.sun_visible(hit.position, hit.normal, self.use_alpha_test) {
            model.sun_radiance() * n_dot_l
        } else {
            Vec3::ZERO
        };
        hit.emissive + hit.albedo * (sun + model.sky(hit.normal) * 0.2)
    }

    fn trace_path(&self, model: &SceneModel, first: Hit, dir: Vec3, rng: &mut SampleGenerator) -> Vec3 {
        let mut radiance = Vec3::ZERO;
        let mut throughput = Vec3::ONE;
        let mut hit = first;
        let mut dir = dir;
        let mut used = Budget {
            surface: 0,
            diffuse: 0,
            specular: 0,
            transmission: 0,
        };

        loop {
            radiance += throughput * self.direct(model, &hit);
            if used.surface >= self.budget.surface {
                break;
            }
            used.surface += 1;

            let lobe = rng.next_f32();
            let transmit = hit.instance == SPHERE && lobe < 0.1;
            let specular = !transmit && lobe < 0.1 + (1.0 - hit.roughness) * 0.5;
            let (origin, next_dir) = if transmit {
                if used.transmission >= self.budget.transmission {
                    break;
                }
                used.transmission += 1;
                match model.refract(&hit, dir) {
                    Some(refracted) => (hit.position - hit.normal * 1e-3, refracted),
                    None => (hit.position + hit.normal * 1e-3, reflect(dir, hit.normal)),
                }
            } else if specular {
                if used.specular >= self.budget.specular {
                    break;
                }
                used.specular += 1;
                let fuzz = cosine_sample(hit.normal, rng.next_vec2()) * hit.roughness;
                let next = (reflect(dir, hit.normal) + fuzz).normalize();
                (hit.position + hit.normal * 1e-3, next)
            } else {
                if used.diffuse >= self.budget.diffuse {
                    break;
                }
                used.diffuse += 1;
                (hit.position + hit.normal * 1e-3, cosine_sample(hit.normal, rng.next_vec2()))
            };

            throughput *= hit.albedo;
            dir = next_dir;
            match model.intersect(origin, dir, self.use_alpha_test) {
                Some(next) => hit = next,
                None => {
                    radiance += throughput * model.sky(dir);
                    break;
                }
            }
        }
        radiance
    }
}

impl RenderPass for PathTracer {
    fn reflect(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("vbuffer", ResourceKind::Visibility),
            PortDesc::input("viewW", ResourceKind::Color).optional(),
            PortDesc::output("color", ResourceKind::Color),
            PortDesc::output("albedo", ResourceKind::Color).optional(),
            PortDesc::output("primary", ResourceKind::Color).optional(),
        ]
    }

    fn configure(&mut self, props: &Properties) -> Result<(), PassError> {
        let before = (self.samples_per_pixel, self.budget, self.use_alpha_test);
        self.apply(props);
        if (self.samples_per_pixel, self.budget, self.use_alpha_test) != before {
            log::debug!("PathTracer: options changed");
            self.options_changed = true;
        }
        Ok(())
    }

    fn set_scene(&mut self, scene: &SceneBinding) {
        self.model = Some(SceneModel::from_scene(scene));
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        // Frames rendered with different options must not be averaged together.
        if std::mem::take(&mut self.options_changed) {
            ctx.raise(RefreshFlags::RENDER_OPTIONS_CHANGED);
        }
        let frame = ctx.frame();
        let extent = frame.resolution;
        let model = match &self.model {
            Some(model) => model.clone(),
            None => SceneModel::from_scene(ctx.scene()),
        };
        let vbuffer = ctx.require_input("vbuffer")?;
        if vbuffer.extent() != extent {
            return Err(PassError::InvalidConfiguration(format!(
                "vbuffer is {} but the frame is {extent}",
                vbuffer.extent()
            )));
        }
        let view = ctx.input("viewW").filter(|view| view.extent() == extent);

        let texels = extent.texel_count();
        let mut color = Vec::with_capacity(texels);
        let mut albedo = Vec::with_capacity(texels);
        let mut primary = Vec::with_capacity(texels);

        for y in 0..extent.height {
            for x in 0..extent.width {
                let dir = match view {
                    Some(view) => -Vec3::from_slice(&view.texel(x, y)[..3]),
                    None => model.primary_ray(x, y, Vec2::ZERO, extent.width, extent.height).1,
                };
                let v = vbuffer.texel(x, y);
                let hit = if v[0] < 0.0 {
                    None
                } else {
                    model
                        .surface(v[0] as u32, Vec2::new(v[1], v[2]))
                        .map(|hit| Hit { t: v[3], ..hit })
                };

                let Some(hit) = hit else {
                    let sky = model.sky(dir);
                    color.push(sky);
                    albedo.push(Vec3::ZERO);
                    primary.push(sky);
                    continue;
                };

                let mut rng = SampleGenerator::new(x, y, frame.index, model.seed());
                let sum: Vec3 = (0..self.samples_per_pixel)
                    .map(|_| self.trace_path(&model, hit, dir, &mut rng))
                    .sum();
                color.push(sum / self.samples_per_pixel as f32);
                albedo.push(hit.albedo);
                primary.push(self.direct(&model, &hit));
            }
        }

        for (port, values) in [("color", &color), ("albedo", &albedo), ("primary", &primary)] {
            if let Some(output) = ctx.output(port) {
                for (texel, value) in output.data_mut().chunks_exact_mut(4).zip(values.iter()) {
                    texel.copy_from_slice(&value.extend(1.0).to_array());
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Analytic stand-in for scene geometry.
//!
//! The CPU passes do not parse scene files. They derive a small analytic
//! scene from the values on the [`SceneBinding`]: a sphere resting on a
//! checkered ground plane, lit by a sun and a sky gradient. Materials are
//! picked from the scene seed so different scenes render differently.

use glam::{Vec2, Vec3};
use lantern_core::scene::SceneBinding;

use super::sampling::hash_u32;

/// Instance id of the sphere in visibility data.
pub const SPHERE: u32 = 0;
/// Instance id of the ground plane in visibility data.
pub const GROUND: u32 = 1;
/// Instance value written for rays that hit nothing.
pub const MISS: f32 = -1.0;

const IOR: f32 = 1.5;

/// A surface hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub position: Vec3,
    pub normal: Vec3,
    pub instance: u32,
    /// Surface parameterization, enough to rebuild the hit.
    pub uv: Vec2,
    pub albedo: Vec3,
    pub roughness: f32,
    pub emissive: Vec3,
}

/// Values derived from a scene binding.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneModel {
    eye: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    tan_half_fov: f32,
    sphere_center: Vec3,
    sphere_radius: f32,
    sphere_albedo: Vec3,
    ground_half_size: f32,
    ground_albedo: [Vec3; 2],
    sun_dir: Vec3,
    sun_radiance: Vec3,
    seed: u64,
}

fn seeded_color(seed: u64, salt: u32) -> Vec3 {
    let h = hash_u32(seed as u32 ^ hash_u32(salt ^ (seed >> 32) as u32));
    let channel = |shift: u32| 0.2 + 0.7 * ((h >> shift) & 0xff) as f32 / 255.0;
    Vec3::new(channel(0), channel(8), channel(16))
}

impl SceneModel {
    pub fn from_scene(scene: &SceneBinding) -> Self {
        let camera = scene.camera();
        let eye = Vec3::from(camera.position);
        let target = Vec3::from(camera.target);
        let forward = (target - eye).try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward);
        let radius = scene.bounds_radius().max(0.1) * 0.5;
        let seed = scene.seed();

        Self {
            eye,
            forward,
            right,
            up,
            tan_half_fov: (camera.fov_y * 0.5).tan(),
            sphere_center: Vec3::new(0.0, radius, 0.0),
            sphere_radius: radius,
            sphere_albedo: seeded_color(seed, 1),
            ground_half_size: radius * 8.0,
            ground_albedo: [seeded_color(seed, 2), seeded_color(seed, 3) * 0.5],
            sun_dir: Vec3::new(0.4, 1.0, 0.3).normalize(),
            sun_radiance: Vec3::splat(2.5),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn sun_dir(&self) -> Vec3 {
        self.sun_dir
    }

    pub fn sun_radiance(&self) -> Vec3 {
        self.sun_radiance
    }

    pub fn bounds_radius(&self) -> f32 {
        self.sphere_radius * 2.0
    }

    /// Primary ray through pixel `(x, y)` offset by `jitter` texels.
    pub fn primary_ray(&self, x: u32, y: u32, jitter: Vec2, width: u32, height: u32) -> (Vec3, Vec3) {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let ndc = Vec2::new(
            (x as f32 + 0.5 + jitter.x) / width.max(1) as f32,
            (y as f32 + 0.5 + jitter.y) / height.max(1) as f32,
        ) * 2.0
            - Vec2::ONE;
        let dir = self.forward
            + self.right * ndc.x * self.tan_half_fov * aspect
            - self.up * ndc.y * self.tan_half_fov;
        (self.eye, dir.normalize())
    }

    /// Background radiance.
    pub fn sky(&self, dir: Vec3) -> Vec3 {
        let t = dir.y.clamp(-1.0, 1.0) * 0.5 + 0.5;
        Vec3::new(0.9, 0.9, 0.95).lerp(Vec3::new(0.3, 0.5, 0.9), t)
    }

    fn ground_alpha(uv: Vec2) -> f32 {
        let cell = (uv * 2.0).floor();
        if (cell.x as i32 + 3 * cell.y as i32).rem_euclid(7) == 0 {
            0.0
        } else {
            1.0
        }
    }

    fn intersect_sphere(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let oc = origin - self.sphere_center;
        let b = oc.dot(dir);
        let c = oc.length_squared() - self.sphere_radius * self.sphere_radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        [-b - sq, -b + sq].into_iter().find(|t| *t > 1e-4)
    }

    fn intersect_ground(&self, origin: Vec3, dir: Vec3, alpha_test: bool) -> Option<f32> {
        if dir.y.abs() < 1e-6 {
            return None;
        }
        let t = -origin.y / dir.y;
        if t <= 1e-4 {
            return None;
        }
        let p = origin + dir * t;
        if p.x.abs() > self.ground_half_size || p.z.abs() > self.ground_half_size {
            return None;
        }
        if alpha_test && Self::ground_alpha(Vec2::new(p.x, p.z)) < 0.5 {
            return None;
        }
        Some(t)
    }

    /// Closest hit along a ray.
    pub fn intersect(&self, origin: Vec3, dir: Vec3, alpha_test: bool) -> Option<Hit> {
        let sphere = self.intersect_sphere(origin, dir);
        let ground = self.intersect_ground(origin, dir, alpha_test);
        let (instance, t) = match (sphere, ground) {
            (Some(s), Some(g)) if g < s => (GROUND, g),
            (Some(s), _) => (SPHERE, s),
            (None, Some(g)) => (GROUND, g),
            (None, None) => return None,
        };
        let position = origin + dir * t;
        let uv = match instance {
            SPHERE => {
                let n = (position - self.sphere_center) / self.sphere_radius;
                Vec2::new(
                    n.y.clamp(-1.0, 1.0).acos(),
                    n.z.atan2(n.x),
                )
            }
            _ => Vec2::new(position.x, position.z),
        };
        self.surface(instance, uv).map(|hit| Hit { t, ..hit })
    }

    /// Rebuild a hit from its instance id and surface parameterization.
    pub fn surface(&self, instance: u32, uv: Vec2) -> Option<Hit> {
        match instance {
            SPHERE => {
                let (sin_theta, cos_theta) = uv.x.sin_cos();
                let (sin_phi, cos_phi) = uv.y.sin_cos();
                let normal = Vec3::new(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi);
                Some(Hit {
                    t: 0.0,
                    position: self.sphere_center + normal * self.sphere_radius,
                    normal,
                    instance,
                    uv,
                    albedo: self.sphere_albedo,
                    roughness: 0.2,
                    emissive: Vec3::ZERO,
                })
            }
            GROUND => {
                let cell = uv.floor();
                let checker = (cell.x as i32 + cell.y as i32).rem_euclid(2) as usize;
                Some(Hit {
                    t: 0.0,
                    position: Vec3::new(uv.x, 0.0, uv.y),
                    normal: Vec3::Y,
                    instance,
                    uv,
                    albedo: self.ground_albedo[checker],
                    roughness: 0.8,
                    emissive: Vec3::ZERO,
                })
            }
            _ => None,
        }
    }

    /// Whether the sun is visible from `position`.
    pub fn sun_visible(&self, position: Vec3, normal: Vec3, alpha_test: bool) -> bool {
        self.intersect(position + normal * 1e-3, self.sun_dir, alpha_test)
            .is_none()
    }

    /// Refraction into a surface, if the hit is on a transmissive instance.
    pub fn refract(&self, hit: &Hit, dir: Vec3) -> Option<Vec3> {
        if hit.instance != SPHERE {
            return None;
        }
        let cos_i = -dir.dot(hit.normal);
        let eta = 1.0 / IOR;
        let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
        (k >= 0.0).then(|| (dir * eta + hit.normal * (eta * cos_i - k.sqrt())).normalize())
    }
}

/// Mirror `dir` about `normal`.
pub fn reflect(dir: Vec3, normal: Vec3) -> Vec3 {
    dir - normal * 2.0 * dir.dot(normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::scene::SceneDescriptor;

    fn model() -> SceneModel {
        SceneModel::from_scene(&SceneBinding::new(SceneDescriptor {
            seed: 7,
            ..Default::default()
        }))
    }

    #[test]
    fn test_center_ray_hits_sphere() {
        let model = model();
        let (origin, dir) = model.primary_ray(8, 8, Vec2::ZERO, 17, 17);
        let hit = model.intersect(origin, dir, true).unwrap();
        assert_eq!(hit.instance, SPHERE);
        assert!((hit.normal.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_upward_ray_misses() {
        let model = model();
        assert!(model.intersect(Vec3::new(0.0, 5.0, 0.0), Vec3::Y, true).is_none());
    }

    #[test]
    fn test_surface_rebuilds_hit() {
        let model = model();
        let (origin, dir) = model.primary_ray(8, 8, Vec2::ZERO, 17, 17);
        let hit = model.intersect(origin, dir, true).unwrap();
        let rebuilt = model.surface(hit.instance, hit.uv).unwrap();
        assert!((rebuilt.position - hit.position).length() < 1e-3);
        assert_eq!(rebuilt.albedo, hit.albedo);
    }

    #[test]
    fn test_reflect() {
        let r = reflect(Vec3::new(1.0, -1.0, 0.0), Vec3::Y);
        assert_eq!(r, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_seed_changes_materials() {
        let a = model();
        let b = SceneModel::from_scene(&SceneBinding::new(SceneDescriptor {
            seed: 8,
            ..Default::default()
        }));
        assert_ne!(a, b);
    }
}

//! Whitted-style radiance integration.
//!
//! Direct lighting from every light with hard shadows, plus recursive
//! perfect-mirror reflection bounded by a caller-supplied depth.

use std::fmt;

use lumen_core::{Color, Hit, Material, Scene};
use lumen_math::{reflect, Camera, Interval, Ray, Vec3};

/// Radiance along a ray plus the distance of what it hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub color: Color,
    /// Distance from the camera to the first hit, infinite on a miss
    pub depth: f32,
}

/// Computes the radiance arriving along a ray.
pub trait Integrator: Send + Sync + fmt::Debug {
    /// Radiance and hit distance for `ray`, following at most `depth`
    /// reflection bounces.
    fn sample(&self, ray: &Ray, scene: &Scene, camera: &Camera, depth: u32) -> Sample;

    /// Outgoing radiance along `ray`.
    fn compute_li(&self, ray: &Ray, scene: &Scene, camera: &Camera, depth: u32) -> Color {
        self.sample(ray, scene, camera, depth).color
    }
}

#[derive(Debug, Clone)]
pub struct SimpleIntegrator {
    /// Offset of secondary rays along the surface normal
    epsilon: f32,
}

impl Default for SimpleIntegrator {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl SimpleIntegrator {
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon: epsilon.max(0.0),
        }
    }

    /// Closest hit among all renderables inside `ray_t`.
    pub fn closest_hit(scene: &Scene, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let mut closest: Option<Hit> = None;
        for renderable in scene.renderables() {
            let range = closest.map_or(ray_t, |hit| ray_t.with_max(hit.t));
            if let Some(hit) = renderable.intersect(ray, range) {
                closest = Some(hit);
            }
        }
        closest
    }

    fn occluded(scene: &Scene, ray: &Ray, ray_t: Interval) -> bool {
        scene
            .renderables()
            .any(|renderable| renderable.intersect(ray, ray_t).is_some())
    }

    /// Whether a light at `distance` along `direction` reaches `hit`.
    ///
    /// Point lights are tested up to the light itself; lights at infinity
    /// until the shadow ray leaves the scene bounds.
    fn visible(&self, scene: &Scene, hit: &Hit, direction: Vec3, distance: f32) -> bool {
        let shadow_ray = Ray::offset(hit.point, direction, hit.normal, self.epsilon);
        let forward = Interval::forward(self.epsilon);

        let range = if distance.is_finite() {
            forward.with_max(distance)
        } else {
            match scene.world_bounds().clip(&shadow_ray, forward) {
                Some(inside) => forward.with_max(inside.max),
                None => return true,
            }
        };

        !Self::occluded(scene, &shadow_ray, range)
    }

    fn direct_lighting(&self, scene: &Scene, hit: &Hit, material: &Material) -> Color {
        let mut color = Color::ZERO;
        for light in scene.lights() {
            if light.is_ambient() {
                color += light.color * material.diffuse_color;
                continue;
            }

            let Some(incoming) = light.illuminate(hit.point) else {
                continue;
            };
            let n_dot_l = hit.normal.dot(incoming.direction);
            if n_dot_l <= 0.0 {
                continue;
            }
            if self.visible(scene, hit, incoming.direction, incoming.distance) {
                color += material.diffuse_color * incoming.radiance * n_dot_l;
            }
        }
        color
    }
}

impl Integrator for SimpleIntegrator {
    fn sample(&self, ray: &Ray, scene: &Scene, camera: &Camera, depth: u32) -> Sample {
        let Some(hit) = Self::closest_hit(scene, ray, Interval::forward(self.epsilon)) else {
            // Miss: background plus ambient, whatever else is in the scene
            return Sample {
                color: scene.background() + scene.ambient(),
                depth: f32::INFINITY,
            };
        };

        let fallback = Material::default();
        let material = scene.material(hit.material).unwrap_or(&fallback);

        let mut color = self.direct_lighting(scene, &hit, material);

        if depth > 0 && material.is_reflective() {
            let direction = reflect(ray.direction().normalize(), hit.normal);
            let reflected = Ray::offset(hit.point, direction, hit.normal, self.epsilon);
            let bounce = self.sample(&reflected, scene, camera, depth - 1);
            color += material.specular * bounce.color;
        }

        Sample {
            color,
            depth: camera.distance_to(hit.point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{Attenuation, Light, Plane, Sphere};

    fn assert_color_near(a: Color, b: Color) {
        assert!((a - b).length() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn test_ambient_only_scene_returns_ambient_exactly() {
        let c = Vec3::new(0.2, 0.4, 0.6);
        let mut scene = Scene::new("ambient");
        scene.add_light("fill", Light::ambient(c));

        let integrator = SimpleIntegrator::default();
        for direction in [Vec3::NEG_Z, Vec3::X, Vec3::new(0.3, -0.2, 0.9).normalize()] {
            let ray = Ray::new(Vec3::ZERO, direction);
            assert_eq!(integrator.compute_li(&ray, &scene, scene.camera(), 3), c);
        }
    }

    #[test]
    fn test_miss_ignores_non_ambient_lights() {
        let mut scene = Scene::new("miss");
        scene.set_background(Vec3::new(0.1, 0.1, 0.3));
        let m = scene.add_material("m", Material::default());
        scene
            .add_renderable("ball", Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, m))
            .unwrap();
        scene.add_light("fill", Light::ambient(Vec3::splat(0.05)));

        let integrator = SimpleIntegrator::default();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let expected = scene.background() + scene.ambient();
        assert_eq!(integrator.compute_li(&ray, &scene, scene.camera(), 2), expected);

        for i in 0..4 {
            scene.add_light(
                format!("key{i}"),
                Light::point(Vec3::splat(i as f32), Vec3::ONE, Attenuation::Quadratic),
            );
            scene.add_light(format!("sun{i}"), Light::directional(Vec3::NEG_Y, Vec3::ONE));
            let sample = integrator.sample(&ray, &scene, scene.camera(), 2);
            assert_eq!(sample.color, expected);
            assert!(sample.depth.is_infinite());
        }
    }

    /// Floor at y = 0, point light straight above the origin at height `d`,
    /// ray hitting the origin at a grazing angle.
    fn floor_scene(d: f32, occluded: bool) -> Scene {
        let mut scene = Scene::new("shadow");
        let white = scene.add_material("white", Material::new(Vec3::ONE));
        scene
            .add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, white))
            .unwrap();
        if occluded {
            scene
                .add_renderable("blocker", Sphere::new(Vec3::new(0.0, d * 0.5, 0.0), d * 0.25, white))
                .unwrap();
        }
        scene.add_light(
            "bulb",
            Light::point(Vec3::new(0.0, d, 0.0), Vec3::ONE, Attenuation::Quadratic),
        );
        scene
    }

    fn grazing_ray() -> Ray {
        let origin = Vec3::new(-4.0, 1.0, 0.0);
        Ray::new(origin, (Vec3::ZERO - origin).normalize())
    }

    #[test]
    fn test_occluded_point_light_contributes_nothing() {
        let integrator = SimpleIntegrator::default();
        for d in [1.0, 2.0, 10.0, 50.0] {
            let scene = floor_scene(d, true);
            let li = integrator.compute_li(&grazing_ray(), &scene, scene.camera(), 0);
            assert_eq!(li, Vec3::ZERO, "d = {d}");
        }
    }

    #[test]
    fn test_unoccluded_point_light_falls_off_quadratically() {
        let integrator = SimpleIntegrator::default();
        for d in [1.0, 2.0, 4.0] {
            let scene = floor_scene(d, false);
            let li = integrator.compute_li(&grazing_ray(), &scene, scene.camera(), 0);
            assert_color_near(li, Vec3::splat(1.0 / (d * d)));
        }
    }

    #[test]
    fn test_directional_light_shadowed_inside_scene_bounds() {
        let mut scene = Scene::new("sun");
        let white = scene.add_material("white", Material::new(Vec3::ONE));
        scene
            .add_renderable("ball", Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, white))
            .unwrap();
        scene
            .add_renderable("roof", Sphere::new(Vec3::new(0.0, 5.0, -5.0), 2.0, white))
            .unwrap();
        scene.add_light("sun", Light::directional(Vec3::NEG_Y, Vec3::ONE));

        let integrator = SimpleIntegrator::default();
        // Hits the top of the ball, which faces the sun but sits under the roof
        let ray = Ray::new(Vec3::new(0.0, 2.0, -5.0), Vec3::NEG_Y);
        assert_eq!(integrator.compute_li(&ray, &scene, scene.camera(), 0), Vec3::ZERO);

        // Same point with nothing overhead is fully lit
        let mut open = Scene::new("open");
        let white = open.add_material("white", Material::new(Vec3::ONE));
        open.add_renderable("ball", Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, white))
            .unwrap();
        open.add_light("sun", Light::directional(Vec3::NEG_Y, Vec3::ONE));
        assert_color_near(integrator.compute_li(&ray, &open, open.camera(), 0), Vec3::ONE);
    }

    #[test]
    fn test_light_behind_surface_is_ignored() {
        let mut scene = Scene::new("backlit");
        let white = scene.add_material("white", Material::new(Vec3::ONE));
        scene
            .add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, white))
            .unwrap();
        scene.add_light("under", Light::point(Vec3::new(0.0, -3.0, 0.0), Vec3::ONE, Attenuation::None));

        let integrator = SimpleIntegrator::default();
        assert_eq!(integrator.compute_li(&grazing_ray(), &scene, scene.camera(), 0), Vec3::ZERO);
    }

    #[test]
    fn test_ambient_light_modulated_by_albedo_on_hit() {
        let mut scene = Scene::new("ambient hit");
        let red = scene.add_material("red", Material::new(Vec3::new(1.0, 0.0, 0.0)));
        scene
            .add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, red))
            .unwrap();
        scene.add_light("fill", Light::ambient(Vec3::splat(0.5)));

        let integrator = SimpleIntegrator::default();
        let sample = integrator.sample(&grazing_ray(), &scene, scene.camera(), 0);
        assert_eq!(sample.color, Vec3::new(0.5, 0.0, 0.0));
        assert!(sample.depth.is_finite());
    }

    #[test]
    fn test_mirror_reflects_background_only_with_depth() {
        let mut scene = Scene::new("mirror");
        scene.set_background(Vec3::new(0.0, 0.0, 1.0));
        let mirror = scene.add_material("mirror", Material::new(Vec3::ZERO).with_specular(0.5));
        scene
            .add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, mirror))
            .unwrap();

        let integrator = SimpleIntegrator::default();
        let ray = grazing_ray();
        assert_eq!(integrator.compute_li(&ray, &scene, scene.camera(), 0), Vec3::ZERO);
        assert_color_near(
            integrator.compute_li(&ray, &scene, scene.camera(), 1),
            Vec3::new(0.0, 0.0, 0.5),
        );
    }

    #[test]
    fn test_facing_mirrors_terminate() {
        let mut scene = Scene::new("hall of mirrors");
        let mirror = scene.add_material("mirror", Material::new(Vec3::ZERO).with_specular(1.0));
        scene
            .add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, mirror))
            .unwrap();
        scene
            .add_renderable("ceiling", Plane::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, mirror))
            .unwrap();
        scene.add_light("fill", Light::ambient(Vec3::splat(0.1)));

        let integrator = SimpleIntegrator::default();
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y);
        // Each bounce adds nothing (black albedo) and the walk stops at depth 0
        assert_eq!(integrator.compute_li(&ray, &scene, scene.camera(), 8), Vec3::ZERO);
    }
}

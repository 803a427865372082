//! Built-in demo scene.

use lumen_core::{Attenuation, Light, Material, Plane, Scene, SceneError, Sphere, Triangle};
use lumen_math::{Camera, Vec3};

/// Three spheres (one a mirror) and a triangle on a floor, lit by a
/// point light, a sun and a little ambient.
pub fn demo_scene(width: u32, height: u32) -> Result<Scene, SceneError> {
    let mut scene = Scene::new("demo");
    scene.set_background(Vec3::new(0.05, 0.07, 0.12));

    let floor = scene.add_material(
        "floor",
        Material::new(Vec3::splat(0.6)).with_specular(0.15),
    );
    let red = scene.add_material("red", Material::new(Vec3::new(0.8, 0.15, 0.1)));
    let blue = scene.add_material("blue", Material::new(Vec3::new(0.1, 0.25, 0.8)));
    let chrome = scene.add_material(
        "chrome",
        Material::new(Vec3::splat(0.1)).with_specular(0.85),
    );
    let gold = scene.add_material("gold", Material::new(Vec3::new(0.9, 0.7, 0.2)));

    scene.add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, floor))?;
    scene.add_renderable("red_ball", Sphere::new(Vec3::new(-1.3, 0.6, 0.0), 0.6, red))?;
    scene.add_renderable(
        "chrome_ball",
        Sphere::new(Vec3::new(0.2, 0.8, -0.6), 0.8, chrome),
    )?;
    scene.add_renderable("blue_ball", Sphere::new(Vec3::new(1.5, 0.4, 0.6), 0.4, blue))?;
    scene.add_renderable(
        "sail",
        Triangle::new(
            Vec3::new(-2.5, 0.0, -2.0),
            Vec3::new(-0.5, 0.0, -2.5),
            Vec3::new(-1.5, 2.2, -2.2),
            gold,
        ),
    )?;

    scene.add_light("fill", Light::ambient(Vec3::splat(0.04)));
    scene.add_light(
        "key",
        Light::point(Vec3::new(3.0, 5.0, 4.0), Vec3::splat(40.0), Attenuation::Quadratic),
    );
    scene.add_light(
        "sun",
        Light::directional(Vec3::new(0.4, -1.0, -0.3), Vec3::new(0.35, 0.33, 0.3)),
    );

    scene.set_camera(
        Camera::new()
            .with_position(Vec3::new(0.0, 1.6, 5.5), Vec3::new(0.0, 0.6, 0.0), Vec3::Y)
            .with_viewport(width, height),
    );

    log::info!(
        "Built scene '{}': {} renderables, {} lights",
        scene.name,
        scene.renderable_count(),
        scene.light_count()
    );
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_is_complete() {
        let scene = demo_scene(64, 48).unwrap();
        assert_eq!(scene.renderable_count(), 5);
        assert_eq!(scene.light_count(), 3);
        assert_eq!(scene.material_count(), 5);
        assert_eq!((scene.camera().width(), scene.camera().height()), (64, 48));
    }
}

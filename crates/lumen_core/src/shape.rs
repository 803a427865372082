//! Renderable surfaces and ray intersection.

use std::fmt;

use lumen_math::{Aabb, Interval, Ray, Vec3};

use crate::MaterialId;

/// Record of a ray-surface intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Point of intersection
    pub point: Vec3,
    /// Unit surface normal, always facing against the incoming ray
    pub normal: Vec3,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    pub material: MaterialId,
}

impl Hit {
    /// Build a hit, flipping `outward_normal` so it faces the ray.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, material: MaterialId) -> Self {
        let front_face = ray.direction().dot(outward_normal) < 0.0;
        Self {
            t,
            point: ray.at(t),
            normal: if front_face {
                outward_normal
            } else {
                -outward_normal
            },
            front_face,
            material,
        }
    }
}

/// Capability of a scene node that can be hit by rays.
pub trait Renderable: Send + Sync + fmt::Debug {
    /// Closest intersection with parameter strictly inside `ray_t`.
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit>;

    /// World-space bounds; unbounded surfaces return `Aabb::UNIVERSE`.
    fn bounding_box(&self) -> Aabb;

    fn material(&self) -> MaterialId;
}

#[derive(Debug, Clone)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: MaterialId,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material: MaterialId) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }
}

impl Renderable for Sphere {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 || a == 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return None;
            }
        }

        let outward_normal = (ray.at(root) - self.center) / self.radius;
        Some(Hit::new(ray, root, outward_normal, self.material))
    }

    fn bounding_box(&self) -> Aabb {
        let rvec = Vec3::splat(self.radius);
        Aabb::from_points(self.center - rvec, self.center + rvec)
    }

    fn material(&self) -> MaterialId {
        self.material
    }
}

/// Infinite plane through `point` with the given normal.
#[derive(Debug, Clone)]
pub struct Plane {
    point: Vec3,
    normal: Vec3,
    material: MaterialId,
}

impl Plane {
    /// A zero `normal` falls back to +Y.
    pub fn new(point: Vec3, normal: Vec3, material: MaterialId) -> Self {
        Self {
            point,
            normal: normal.try_normalize().unwrap_or(Vec3::Y),
            material,
        }
    }
}

impl Renderable for Plane {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let denom = self.normal.dot(ray.direction());
        if denom.abs() < 1e-8 {
            return None;
        }
        let t = (self.point - ray.origin()).dot(self.normal) / denom;
        if !ray_t.surrounds(t) {
            return None;
        }
        Some(Hit::new(ray, t, self.normal, self.material))
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::UNIVERSE
    }

    fn material(&self) -> MaterialId {
        self.material
    }
}

/// Single triangle, intersected with Möller-Trumbore.
#[derive(Debug, Clone)]
pub struct Triangle {
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed face normal (unit length)
    normal: Vec3,
    material: MaterialId,
}

impl Triangle {
    /// Counter-clockwise winding defines the front face.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: MaterialId) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        Self {
            v0,
            v1,
            v2,
            normal,
            material,
        }
    }
}

impl Renderable for Triangle {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        const EPSILON: f32 = 1e-8;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let h = ray.direction().cross(edge2);
        let a = edge1.dot(h);

        // Ray parallel to the triangle (or degenerate triangle)
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if !ray_t.surrounds(t) {
            return None;
        }

        Some(Hit::new(ray, t, self.normal, self.material))
    }

    fn bounding_box(&self) -> Aabb {
        let min = self.v0.min(self.v1).min(self.v2);
        let max = self.v0.max(self.v1).max(self.v2);
        // Pad thin dimensions to avoid degenerate AABBs
        let delta = Vec3::splat(1e-4);
        Aabb::from_points(min - delta, max + delta)
    }

    fn material(&self) -> MaterialId {
        self.material
    }
}

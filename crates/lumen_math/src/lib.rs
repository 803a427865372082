//! Lumen math - linear algebra re-exports plus the small geometric types
//! shared by the scene and the renderer.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod camera;
mod interval;
mod ray;
mod rect;

pub use aabb::Aabb;
pub use camera::{safe_inverse, Camera, Projection, ProjectionKind};
pub use interval::Interval;
pub use ray::Ray;
pub use rect::Rectangle;

/// Reflect `incident` about the surface `normal` (which must be unit length).
#[inline]
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * incident.dot(normal) * normal
}

use crate::Vec3;

/// A half-line starting at `origin` and travelling along `direction`.
///
/// The direction is not required to be unit length, but every ray built by
/// the camera or the integrator is normalized so that the parameter `t`
/// reads as a world-space distance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Create a ray whose origin is nudged along `normal` by `epsilon`.
    ///
    /// Used for secondary rays leaving a surface so they do not immediately
    /// re-hit the surface they start on.
    pub fn offset(origin: Vec3, direction: Vec3, normal: Vec3, epsilon: f32) -> Self {
        let side = if direction.dot(normal) >= 0.0 { 1.0 } else { -1.0 };
        Self::new(origin + normal * (epsilon * side), direction)
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::NEG_Z)
    }
}

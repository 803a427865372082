//! Light sources.

use lumen_math::Vec3;

use crate::Color;

/// Falloff of a point light with distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attenuation {
    #[default]
    None,
    /// Inverse-square falloff.
    Quadratic,
}

impl Attenuation {
    pub fn factor(&self, distance: f32) -> f32 {
        match self {
            Attenuation::None => 1.0,
            Attenuation::Quadratic => 1.0 / (distance * distance).max(f32::MIN_POSITIVE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Constant light reaching every point, never shadowed.
    Ambient,
    /// Light at infinity travelling along `direction` (unit length).
    Directional { direction: Vec3 },
    Point {
        position: Vec3,
        attenuation: Attenuation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
}

/// What a non-ambient light delivers to a surface point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Unit vector from the surface point toward the light.
    pub direction: Vec3,
    /// Distance to the light, infinite for directional lights.
    pub distance: f32,
    /// Light color scaled by attenuation.
    pub radiance: Color,
}

impl Light {
    pub fn ambient(color: Color) -> Self {
        Self {
            kind: LightKind::Ambient,
            color,
        }
    }

    /// A zero `direction` falls back to straight down.
    pub fn directional(direction: Vec3, color: Color) -> Self {
        Self {
            kind: LightKind::Directional {
                direction: direction.try_normalize().unwrap_or(Vec3::NEG_Y),
            },
            color,
        }
    }

    pub fn point(position: Vec3, color: Color, attenuation: Attenuation) -> Self {
        Self {
            kind: LightKind::Point {
                position,
                attenuation,
            },
            color,
        }
    }

    pub fn is_ambient(&self) -> bool {
        matches!(self.kind, LightKind::Ambient)
    }

    /// Light arriving at `p`, before any visibility test.
    ///
    /// Ambient lights return `None`; so does a point light sitting exactly
    /// on `p`, which has no defined direction.
    pub fn illuminate(&self, p: Vec3) -> Option<LightSample> {
        match self.kind {
            LightKind::Ambient => None,
            LightKind::Directional { direction } => Some(LightSample {
                direction: -direction,
                distance: f32::INFINITY,
                radiance: self.color,
            }),
            LightKind::Point {
                position,
                attenuation,
            } => {
                let to_light = position - p;
                let distance = to_light.length();
                let direction = to_light.try_normalize()?;
                Some(LightSample {
                    direction,
                    distance,
                    radiance: self.color * attenuation.factor(distance),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_attenuation() {
        assert_eq!(Attenuation::None.factor(10.0), 1.0);
        assert!((Attenuation::Quadratic.factor(2.0) - 0.25).abs() < 1e-6);
        assert!(Attenuation::Quadratic.factor(0.0).is_finite());
    }

    #[test]
    fn test_point_light_sample() {
        let light = Light::point(Vec3::new(0.0, 4.0, 0.0), Vec3::ONE, Attenuation::Quadratic);
        let sample = light.illuminate(Vec3::ZERO).unwrap();
        assert_eq!(sample.direction, Vec3::Y);
        assert_eq!(sample.distance, 4.0);
        assert!((sample.radiance.x - 1.0 / 16.0).abs() < 1e-6);

        assert!(light.illuminate(Vec3::new(0.0, 4.0, 0.0)).is_none());
    }

    #[test]
    fn test_directional_points_back_toward_source() {
        let light = Light::directional(Vec3::new(0.0, -2.0, 0.0), Vec3::ONE);
        let sample = light.illuminate(Vec3::new(5.0, 0.0, 1.0)).unwrap();
        assert_eq!(sample.direction, Vec3::Y);
        assert!(sample.distance.is_infinite());
    }

    #[test]
    fn test_ambient_has_no_direction() {
        let light = Light::ambient(Vec3::splat(0.2));
        assert!(light.is_ambient());
        assert!(light.illuminate(Vec3::ZERO).is_none());
    }
}

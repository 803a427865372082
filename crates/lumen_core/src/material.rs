//! Surface materials.

use lumen_math::Vec3;

/// Color type alias (linear RGB, typically 0-1)
pub type Color = Vec3;

/// Index of a material in its scene's material list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

/// A Whitted-style surface: diffuse albedo plus a perfect-mirror term.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Diffuse/albedo color (RGB, 0-1)
    pub diffuse_color: Color,

    /// Weight of the mirror reflection (0 = matte, 1 = perfect mirror)
    pub specular: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse_color: Vec3::new(0.5, 0.5, 0.5), // Grey default
            specular: 0.0,
        }
    }
}

impl Material {
    pub fn new(diffuse_color: Color) -> Self {
        Self {
            diffuse_color,
            ..Default::default()
        }
    }

    /// Set the specular weight, clamped to [0, 1].
    pub fn with_specular(mut self, specular: f32) -> Self {
        self.specular = specular.clamp(0.0, 1.0);
        self
    }

    pub fn is_reflective(&self) -> bool {
        self.specular > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specular_is_clamped() {
        assert_eq!(Material::default().with_specular(3.0).specular, 1.0);
        assert_eq!(Material::default().with_specular(-1.0).specular, 0.0);
        assert!(!Material::default().is_reflective());
        assert!(Material::default().with_specular(0.2).is_reflective());
    }
}

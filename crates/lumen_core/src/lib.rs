//! Lumen Core - scene description for the Lumen ray tracer.
//!
//! This crate provides:
//!
//! - **Scene graph types**: `Scene`, `SceneNode`, `NodeKind`
//! - **Capabilities**: `Renderable` surfaces (`Sphere`, `Plane`, `Triangle`),
//!   `Light`s and `Material`s
//!
//! A scene is immutable while a render pass reads it; the renderer shares it
//! between worker threads behind an `Arc`.
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::{Light, Material, Scene, Sphere};
//! use lumen_math::Vec3;
//!
//! let mut scene = Scene::new("demo");
//! let red = scene.add_material("red", Material::new(Vec3::new(0.8, 0.1, 0.1)));
//! scene.add_renderable("ball", Sphere::new(Vec3::ZERO, 1.0, red))?;
//! scene.add_light("sun", Light::directional(Vec3::NEG_Y, Vec3::ONE));
//! ```

pub mod light;
pub mod material;
pub mod scene;
pub mod shape;

// Re-export commonly used types
pub use light::{Attenuation, Light, LightKind, LightSample};
pub use material::{Color, Material, MaterialId};
pub use scene::{NodeId, NodeKind, Scene, SceneError, SceneNode};
pub use shape::{Hit, Plane, Renderable, Sphere, Triangle};

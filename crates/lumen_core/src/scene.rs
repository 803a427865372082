//! Scene graph types for Lumen.
//!
//! A scene is a flat list of nodes. Each node exposes at most one
//! capability (renderable surface, light or material); `Scene::add_node`
//! classifies it into the matching secondary index so renderers can walk
//! surfaces and lights without touching the rest.

use std::sync::Arc;

use lumen_math::{Aabb, Camera, Vec3};
use thiserror::Error;

use crate::{Color, Light, Material, MaterialId, Renderable};

/// Errors raised while building a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("node '{node}' references unknown material {material:?}")]
    UnknownMaterial { node: String, material: MaterialId },
}

/// Index of a node in its scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Renderable(Arc<dyn Renderable>),
    Light(Light),
    Material(Material),
    /// Grouping or bookkeeping node with no render capability.
    Plain,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn renderable(name: impl Into<String>, renderable: impl Renderable + 'static) -> Self {
        Self::new(name, NodeKind::Renderable(Arc::new(renderable)))
    }

    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    pub fn material(name: impl Into<String>, material: Material) -> Self {
        Self::new(name, NodeKind::Material(material))
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Plain)
    }

    pub fn as_renderable(&self) -> Option<&dyn Renderable> {
        match &self.kind {
            NodeKind::Renderable(r) => Some(r.as_ref()),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_material(&self) -> Option<&Material> {
        match &self.kind {
            NodeKind::Material(material) => Some(material),
            _ => None,
        }
    }
}

/// A complete scene: nodes, their typed indices, a camera and a background.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Scene name (usually from the demo or file it came from)
    pub name: String,

    nodes: Vec<SceneNode>,

    // Secondary indices into `nodes`
    renderables: Vec<usize>,
    lights: Vec<usize>,
    materials: Vec<usize>,

    camera: Camera,
    background: Color,
    bounds: Aabb,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("")
    }
}

impl Scene {
    /// Create an empty scene with a default camera and black background.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            renderables: Vec::new(),
            lights: Vec::new(),
            materials: Vec::new(),
            camera: Camera::default(),
            background: Vec3::ZERO,
            bounds: Aabb::EMPTY,
        }
    }

    /// Add a node and index it by capability.
    ///
    /// Renderables must reference a material that is already in the scene.
    pub fn add_node(&mut self, node: SceneNode) -> Result<NodeId, SceneError> {
        let index = self.nodes.len();

        if let Some(renderable) = node.as_renderable() {
            let material = renderable.material();
            if material.0 >= self.materials.len() {
                return Err(SceneError::UnknownMaterial {
                    node: node.name,
                    material,
                });
            }
            self.bounds = Aabb::surrounding(&self.bounds, &renderable.bounding_box());
            self.renderables.push(index);
        }
        if node.as_light().is_some() {
            self.lights.push(index);
        }
        if node.as_material().is_some() {
            self.materials.push(index);
        }

        log::trace!("Scene '{}': added node '{}' as #{}", self.name, node.name, index);
        self.nodes.push(node);
        Ok(NodeId(index))
    }

    /// Add a material and return the id renderables use to reference it.
    pub fn add_material(&mut self, name: impl Into<String>, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len());
        self.materials.push(self.nodes.len());
        self.nodes.push(SceneNode::material(name, material));
        id
    }

    pub fn add_light(&mut self, name: impl Into<String>, light: Light) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.lights.push(id.0);
        self.nodes.push(SceneNode::light(name, light));
        id
    }

    pub fn add_renderable(
        &mut self,
        name: impl Into<String>,
        renderable: impl Renderable + 'static,
    ) -> Result<NodeId, SceneError> {
        self.add_node(SceneNode::renderable(name, renderable))
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter()
    }

    pub fn renderables(&self) -> impl Iterator<Item = &dyn Renderable> + '_ {
        self.renderables
            .iter()
            .filter_map(move |&i| self.nodes[i].as_renderable())
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> + '_ {
        self.lights.iter().filter_map(move |&i| self.nodes[i].as_light())
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials
            .get(id.0)
            .and_then(|&i| self.nodes[i].as_material())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn renderable_count(&self) -> usize {
        self.renderables.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    /// Sum of all ambient light colors.
    pub fn ambient(&self) -> Color {
        self.lights()
            .filter(|light| light.is_ambient())
            .map(|light| light.color)
            .sum()
    }

    /// World-space bounds of all renderables (empty for no geometry).
    pub fn world_bounds(&self) -> Aabb {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attenuation, Plane, Sphere};

    #[test]
    fn test_nodes_are_classified_by_capability() {
        let mut scene = Scene::new("test");
        let grey = scene.add_material("grey", Material::default());
        scene
            .add_renderable("ball", Sphere::new(Vec3::ZERO, 1.0, grey))
            .unwrap();
        scene.add_light("key", Light::point(Vec3::Y * 5.0, Vec3::ONE, Attenuation::None));
        scene.add_node(SceneNode::plain("group")).unwrap();

        assert_eq!(scene.node_count(), 4);
        assert_eq!(scene.renderable_count(), 1);
        assert_eq!(scene.light_count(), 1);
        assert_eq!(scene.material_count(), 1);
        assert_eq!(scene.renderables().count(), 1);
        assert_eq!(scene.material(grey), Some(&Material::default()));
    }

    #[test]
    fn test_add_node_matches_typed_helpers() {
        let mut scene = Scene::new("test");
        let id = scene
            .add_node(SceneNode::material("red", Material::new(Vec3::X)))
            .unwrap();
        assert_eq!(scene.material(MaterialId(0)).unwrap().diffuse_color, Vec3::X);
        assert!(scene.node(id).unwrap().as_material().is_some());

        scene
            .add_node(SceneNode::light("fill", Light::ambient(Vec3::ONE)))
            .unwrap();
        assert_eq!(scene.lights().count(), 1);
    }

    #[test]
    fn test_unknown_material_is_rejected() {
        let mut scene = Scene::new("test");
        let err = scene
            .add_renderable("orphan", Sphere::new(Vec3::ZERO, 1.0, MaterialId(3)))
            .unwrap_err();
        assert!(matches!(err, SceneError::UnknownMaterial { .. }));
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn test_ambient_sums_only_ambient_lights() {
        let mut scene = Scene::new("test");
        scene.add_light("a", Light::ambient(Vec3::splat(0.1)));
        scene.add_light("b", Light::ambient(Vec3::splat(0.2)));
        scene.add_light("sun", Light::directional(Vec3::NEG_Y, Vec3::ONE));
        assert!((scene.ambient() - Vec3::splat(0.3)).length() < 1e-6);
    }

    #[test]
    fn test_world_bounds_grow_with_renderables() {
        let mut scene = Scene::new("test");
        assert!(scene.world_bounds().is_empty());

        let m = scene.add_material("m", Material::default());
        scene
            .add_renderable("a", Sphere::new(Vec3::ZERO, 1.0, m))
            .unwrap();
        scene
            .add_renderable("b", Sphere::new(Vec3::new(4.0, 0.0, 0.0), 1.0, m))
            .unwrap();
        let bounds = scene.world_bounds();
        assert_eq!(bounds.x.min, -1.0);
        assert_eq!(bounds.x.max, 5.0);

        scene
            .add_renderable("floor", Plane::new(Vec3::ZERO, Vec3::Y, m))
            .unwrap();
        assert_eq!(scene.world_bounds(), Aabb::UNIVERSE);
    }
}

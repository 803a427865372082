use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

use crate::Ray;

/// Cross products shorter than this are treated as colinear inputs.
const DEGENERATE_EPSILON: f32 = 1e-6;

/// Invert `m`, falling back to the identity when `m` is singular or not
/// finite, so that a degenerate camera never produces NaN coordinates.
pub fn safe_inverse(m: &Mat4) -> Mat4 {
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() {
        log::warn!("Singular matrix (det={det}), using identity");
        return Mat4::IDENTITY;
    }
    let inv = m.inverse();
    if inv.is_finite() {
        inv
    } else {
        log::warn!("Matrix inverse is not finite, using identity");
        Mat4::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Orthographic,
    Perspective,
}

/// View volume in camera space, OpenGL conventions (NDC z in [-1, 1]).
///
/// For perspective projections `left/right/bottom/top` describe the window
/// on the near plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    /// Symmetric perspective frustum from a vertical field of view (radians).
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let top = near * (fov_y * 0.5).tan();
        let right = top * aspect;
        Self {
            kind: ProjectionKind::Perspective,
            left: -right,
            right,
            bottom: -top,
            top,
            near,
            far,
        }
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self {
            kind: ProjectionKind::Orthographic,
            left,
            right,
            bottom,
            top,
            near,
            far,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    fn center(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) * 0.5,
            (self.bottom + self.top) * 0.5,
        )
    }

    fn is_degenerate(&self) -> bool {
        let depth = self.far - self.near;
        self.width() == 0.0
            || self.height() == 0.0
            || depth == 0.0
            || (self.kind == ProjectionKind::Perspective && self.near <= 0.0)
    }

    /// Same vertical extent, horizontal extent rescaled to `aspect` around
    /// the window's horizontal center.
    pub fn fit_aspect(&self, aspect: f32) -> Self {
        let half_width = self.height() * aspect * 0.5;
        let cx = self.center().x;
        Self {
            left: cx - half_width,
            right: cx + half_width,
            ..*self
        }
    }

    /// Window shrunk (zoom > 1) or grown (zoom < 1) symmetrically around its
    /// center.
    pub fn zoomed(&self, zoom: f32) -> Self {
        let c = self.center();
        let half_width = self.width() * 0.5 / zoom;
        let half_height = self.height() * 0.5 / zoom;
        Self {
            left: c.x - half_width,
            right: c.x + half_width,
            bottom: c.y - half_height,
            top: c.y + half_height,
            ..*self
        }
    }

    /// Camera-to-clip matrix. Degenerate volumes map to the identity.
    pub fn matrix(&self) -> Mat4 {
        if self.is_degenerate() {
            log::warn!("Degenerate projection {:?}, using identity", self);
            return Mat4::IDENTITY;
        }

        let (l, r, b, t, n, f) = (
            self.left, self.right, self.bottom, self.top, self.near, self.far,
        );
        match self.kind {
            ProjectionKind::Orthographic => Mat4::orthographic_rh_gl(l, r, b, t, n, f),
            ProjectionKind::Perspective => Mat4::from_cols(
                Vec4::new(2.0 * n / (r - l), 0.0, 0.0, 0.0),
                Vec4::new(0.0, 2.0 * n / (t - b), 0.0, 0.0),
                Vec4::new(
                    (r + l) / (r - l),
                    (t + b) / (t - b),
                    -(f + n) / (f - n),
                    -1.0,
                ),
                Vec4::new(0.0, 0.0, -2.0 * f * n / (f - n), 0.0),
            ),
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(60.0_f32.to_radians(), 4.0 / 3.0, 0.1, 100.0)
    }
}

/// Camera with an orthonormal frame, a projection and a pixel viewport.
///
/// All derived state (basis, matrices, effective projection) is recomputed
/// eagerly by the setters, so the getters are plain reads and the camera can
/// be shared immutably with render workers.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    look_at: Vec3,

    // Orthonormal frame
    lateral: Vec3,
    look: Vec3,
    up: Vec3,

    // Projection as requested by the caller, before aspect and zoom
    requested: Projection,
    // Projection actually used for the matrices
    projection: Projection,
    zoom: f32,
    viewport: UVec2,

    view: Mat4,
    proj: Mat4,
    view_proj: Mat4,
    inv_view_proj: Mat4,
}

impl Camera {
    /// Perspective camera at `(0, 0, 5)` looking at the origin, 640x480.
    pub fn new() -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            lateral: Vec3::NEG_X,
            look: Vec3::NEG_Z,
            up: Vec3::Y,
            requested: Projection::default(),
            projection: Projection::default(),
            zoom: 1.0,
            viewport: UVec2::new(640, 480),
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            inv_view_proj: Mat4::IDENTITY,
        };
        camera.set(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        camera.update_projection();
        camera
    }

    /// Set camera position.
    pub fn with_position(mut self, eye: Vec3, look_at: Vec3, up: Vec3) -> Self {
        self.set(eye, look_at, up);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.set_projection(projection);
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.set_viewport(width, height);
        self
    }

    /// Place the camera and rebuild its orthonormal frame.
    ///
    /// `lateral = up x look`, then `up = look x lateral`, so any `up` that is
    /// not parallel to the viewing direction yields an orthonormal frame.
    /// An `up` parallel to the viewing direction is replaced by an arbitrary
    /// perpendicular vector. If `eye == look_at` the call is ignored.
    pub fn set(&mut self, eye: Vec3, look_at: Vec3, up: Vec3) {
        let Some(look) = (look_at - eye).try_normalize() else {
            log::warn!("Camera eye and look-at coincide at {eye:?}, keeping previous frame");
            return;
        };

        let mut lateral = up.cross(look);
        if lateral.length_squared() < DEGENERATE_EPSILON {
            let fallback_up = look.any_orthonormal_vector();
            log::warn!("Camera up {up:?} is parallel to look {look:?}, using {fallback_up:?}");
            lateral = fallback_up.cross(look);
        }
        let lateral = lateral.normalize();

        self.position = eye;
        self.look_at = look_at;
        self.look = look;
        self.lateral = lateral;
        self.up = look.cross(lateral);
        self.view = Mat4::look_to_rh(self.position, self.look, self.up);
        self.update_matrices();
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.requested = projection;
        self.update_projection();
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = UVec2::new(width, height);
        self.update_projection();
    }

    /// Magnification factor; 2.0 halves the visible window. Non-positive or
    /// non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if !(zoom.is_finite() && zoom > 0.0) {
            log::warn!("Ignoring invalid camera zoom {zoom}");
            return;
        }
        self.zoom = zoom;
        self.update_projection();
    }

    fn update_projection(&mut self) {
        let size = self.viewport.max(UVec2::ONE).as_vec2();
        self.projection = self.requested.fit_aspect(size.x / size.y).zoomed(self.zoom);
        self.proj = self.projection.matrix();
        self.update_matrices();
    }

    fn update_matrices(&mut self) {
        self.view_proj = self.proj * self.view;
        self.inv_view_proj = safe_inverse(&self.view_proj);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }

    pub fn lateral(&self) -> Vec3 {
        self.lateral
    }

    pub fn look(&self) -> Vec3 {
        self.look
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Effective projection (aspect-fitted and zoomed).
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn requested_projection(&self) -> &Projection {
        &self.requested
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> UVec2 {
        self.viewport
    }

    pub fn width(&self) -> u32 {
        self.viewport.x
    }

    pub fn height(&self) -> u32 {
        self.viewport.y
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_proj
    }

    /// Pixel coordinates (origin bottom-left) to NDC x/y.
    pub fn screen_to_ndc(&self, screen: Vec2) -> Vec2 {
        let size = self.viewport.max(UVec2::ONE).as_vec2();
        screen / size * 2.0 - Vec2::ONE
    }

    pub fn ndc_to_screen(&self, ndc: Vec2) -> Vec2 {
        (ndc + Vec2::ONE) * 0.5 * self.viewport.as_vec2()
    }

    /// Project through projection * view and divide by w.
    pub fn world_to_ndc(&self, p: Vec3) -> Vec3 {
        self.view_proj.project_point3(p)
    }

    pub fn ndc_to_world(&self, ndc: Vec3) -> Vec3 {
        self.inv_view_proj.project_point3(ndc)
    }

    /// Returns pixel x/y (bottom-left origin) and the NDC depth in z.
    pub fn world_to_screen(&self, p: Vec3) -> Vec3 {
        let ndc = self.world_to_ndc(p);
        self.ndc_to_screen(ndc.truncate()).extend(ndc.z)
    }

    /// Unproject a pixel. A pixel alone is ambiguous in depth, so
    /// `reference` supplies the NDC depth the result is placed at.
    pub fn screen_to_world(&self, screen: Vec2, reference: Vec3) -> Vec3 {
        let depth = self.world_to_ndc(reference).z;
        self.ndc_to_world(self.screen_to_ndc(screen).extend(depth))
    }

    /// Primary ray through a (sub-)pixel position.
    ///
    /// Perspective rays start at the eye; orthographic rays start on the
    /// near plane and travel along the viewing direction.
    pub fn primary_ray(&self, screen: Vec2) -> Ray {
        let near_point = self.ndc_to_world(self.screen_to_ndc(screen).extend(-1.0));
        match self.projection.kind {
            ProjectionKind::Perspective => {
                let direction = (near_point - self.position)
                    .try_normalize()
                    .unwrap_or(self.look);
                Ray::new(self.position, direction)
            }
            ProjectionKind::Orthographic => Ray::new(near_point, self.look),
        }
    }

    /// Distance from the eye to `p`.
    pub fn distance_to(&self, p: Vec3) -> f32 {
        (p - self.position).length()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

//! # Camera
//!
//! Perspective camera the passes render from. The scene traversal hands the
//! active camera to [`RenderQueue::set_camera`] and to the pass; the shadow
//! stage also uses its frustum to fit directional light cascades.
//!
//! Uses a right-handed, Y-up view space looking down -Z.
//!
//! [`RenderQueue::set_camera`]: crate::render::queue::RenderQueue::set_camera

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// 3D perspective camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector (typically +Y)
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Near clipping distance
    pub near: f32,

    /// Far clipping distance
    pub far: f32,

    /// Viewport size in pixels; also the size of the pass targets
    pub viewport: (u32, u32),
}

impl Camera {
    /// Create a perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `viewport` - Output size in pixels
    /// * `near` / `far` - Clipping distances (`0 < near < far`)
    pub fn perspective(position: Vec3, fov_degrees: f32, viewport: (u32, u32), near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::y(),
            fov: utils::deg_to_rad(fov_degrees),
            near,
            far,
            viewport,
        }
    }

    /// Move the camera
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Point the camera at `target` with a custom up vector
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Resize the output
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if self.viewport != (width, height) {
            log::info!("Camera viewport changed: {:?} -> {}x{}", self.viewport, width, height);
        }
        self.viewport = (width, height);
    }

    /// Width over height; 1.0 for a degenerate viewport
    pub fn aspect(&self) -> f32 {
        let (w, h) = self.viewport;
        if w == 0 || h == 0 { 1.0 } else { w as f32 / h as f32 }
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        let dir = self.target - self.position;
        if dir.norm_squared() > 0.0 { dir.normalize() } else { -Vec3::z() }
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// View-to-clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect(), self.near, self.far)
    }

    /// Orthographic projection over the viewport in pixels, used for screen-space overlays
    pub fn screen_projection(&self) -> Mat4 {
        let (w, h) = self.viewport;
        Mat4::orthographic(0.0, w as f32, h as f32, 0.0, -1.0, 1.0)
    }

    /// Eight world-space corners of the view frustum slice between `near` and `far`
    ///
    /// Order: near plane (bl, br, tr, tl) then far plane in the same order.
    pub fn frustum_slice_corners(&self, near: f32, far: f32) -> [Vec3; 8] {
        let forward = self.forward();
        let right = {
            let r = forward.cross(&self.up);
            if r.norm_squared() > 0.0 { r.normalize() } else { Vec3::x() }
        };
        let up = right.cross(&forward);
        let tan = (self.fov * 0.5).tan();
        let aspect = self.aspect();

        let mut corners = [Vec3::zeros(); 8];
        for (plane, distance) in [near, far].into_iter().enumerate() {
            let half_h = distance * tan;
            let half_w = half_h * aspect;
            let center = self.position + forward * distance;
            let quad = [
                center - right * half_w - up * half_h,
                center + right * half_w - up * half_h,
                center + right * half_w + up * half_h,
                center - right * half_w + up * half_h,
            ];
            corners[plane * 4..plane * 4 + 4].copy_from_slice(&quad);
        }
        corners
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 2.0, 5.0), 60.0, (1280, 720), 0.1, 100.0)
    }
}

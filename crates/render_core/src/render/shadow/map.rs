//! Per-light shadow map state

use std::rc::{Rc, Weak};

use crate::foundation::math::Mat4;
use crate::render::resources::{Light, LightKind, ViewportRect};

use super::projection;

/// Depth bias applied when sampling a shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowBias {
    /// Constant offset
    pub constant: f32,
    /// Offset scaled by the surface slope
    pub slope: f32,
}

impl Default for ShadowBias {
    fn default() -> Self {
        Self { constant: 0.005, slope: 1.5 }
    }
}

/// Shadow data of one light
///
/// Owned by its light and rewritten every frame the light is packed into the
/// atlas. Sub-viewports are stored twice: relative to the light's atlas cell
/// (what the shader samples with) and relative to the whole atlas (what the
/// rasterizer renders into).
#[derive(Debug)]
pub struct ShadowMap {
    light: Weak<Light>,
    kind: LightKind,
    projections: [Mat4; 4],
    view: Mat4,
    cell_index: usize,
    cell: ViewportRect,
    shader_viewports: Vec<ViewportRect>,
    render_viewports: Vec<ViewportRect>,
    cascade_splits: [f32; 4],
    bias: ShadowBias,
    active: bool,
}

impl ShadowMap {
    /// Fresh, inactive map for `light`
    pub fn new(light: Weak<Light>) -> Self {
        let kind = light.upgrade().map_or(LightKind::Directional, |l| l.kind);
        Self {
            light,
            kind,
            projections: [Mat4::identity(); 4],
            view: Mat4::identity(),
            cell_index: 0,
            cell: ViewportRect::full(),
            shader_viewports: Vec::new(),
            render_viewports: Vec::new(),
            cascade_splits: [0.0; 4],
            bias: ShadowBias::default(),
            active: false,
        }
    }

    /// Owning light, if it is still alive
    pub fn light(&self) -> Option<Rc<Light>> {
        self.light.upgrade()
    }

    /// Kind of the owning light
    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// Place the map in an atlas cell
    pub fn assign(
        &mut self,
        cell_index: usize,
        cell: ViewportRect,
        shader_viewports: Vec<ViewportRect>,
        render_viewports: Vec<ViewportRect>,
    ) {
        self.cell_index = cell_index;
        self.cell = cell;
        self.shader_viewports = shader_viewports;
        self.render_viewports = render_viewports;
        self.active = true;
    }

    /// Mark the map unused for this frame
    pub fn deactivate(&mut self) {
        self.active = false;
        self.shader_viewports.clear();
        self.render_viewports.clear();
    }

    /// True when the map was packed this frame
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Store this frame's matrices; non-directional lights use slot 0 only
    pub fn set_matrices(&mut self, projections: [Mat4; 4], view: Mat4) {
        self.projections = projections;
        self.view = view;
    }

    /// Projection of a slot
    pub fn projection(&self, slot: usize) -> Mat4 {
        self.projections[slot.min(3)]
    }

    /// All projection slots
    pub fn projections(&self) -> &[Mat4; 4] {
        &self.projections
    }

    /// Light view matrix
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Projection used for sub-viewport `index`; point lights fold the cube face rotation in
    pub fn face_projection(&self, index: usize) -> Mat4 {
        match self.kind {
            LightKind::Directional => self.projection(index),
            LightKind::Point => self.projections[0] * projection::cube_face_rotation(index),
            LightKind::Spot | LightKind::Ambient => self.projections[0],
        }
    }

    /// World-to-clip transform used to render and sample sub-viewport `index`
    pub fn light_space(&self, index: usize) -> Mat4 {
        self.face_projection(index) * self.view
    }

    /// Atlas cell index
    pub fn cell_index(&self) -> usize {
        self.cell_index
    }

    /// Atlas cell, atlas-relative
    pub fn cell(&self) -> ViewportRect {
        self.cell
    }

    /// Sub-viewports relative to the cell
    pub fn shader_viewports(&self) -> &[ViewportRect] {
        &self.shader_viewports
    }

    /// Sub-viewports relative to the atlas
    pub fn render_viewports(&self) -> &[ViewportRect] {
        &self.render_viewports
    }

    /// View-space far distance of each cascade
    pub fn cascade_splits(&self) -> [f32; 4] {
        self.cascade_splits
    }

    /// Store cascade split distances
    pub fn set_cascade_splits(&mut self, splits: [f32; 4]) {
        self.cascade_splits = splits;
    }

    /// Sampling bias
    pub fn bias(&self) -> ShadowBias {
        self.bias
    }

    /// Change the sampling bias
    pub fn set_bias(&mut self, bias: ShadowBias) {
        self.bias = bias;
    }
}

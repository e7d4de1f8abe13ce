//! Light records consumed by the lit stages and the shadow stage
//!
//! A light owns its [`ShadowMap`]; the map is created the first time the
//! light is packed into the shadow atlas and lives as long as the light. The
//! map only points back at the light weakly.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::shadow::ShadowMap;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Constant ambient term
    Ambient,
    /// Omni-directional light at a position
    Point,
    /// Parallel rays (sun)
    Directional,
    /// Cone from a position
    Spot,
}

impl LightKind {
    /// Integer tag uploaded to shaders
    pub fn shader_tag(self) -> i32 {
        match self {
            Self::Ambient => 0,
            Self::Point => 1,
            Self::Directional => 2,
            Self::Spot => 3,
        }
    }

    /// Whether this kind can own a shadow map at all
    pub fn can_cast_shadow(self) -> bool {
        !matches!(self, Self::Ambient)
    }
}

/// Distance attenuation `1 / (c + l*d + q*d^2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear term
    pub linear: f32,
    /// Quadratic term
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.09, quadratic: 0.032 }
    }
}

/// Light source
#[derive(Debug)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    transform: Cell<Mat4>,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Distance attenuation (point/spot)
    pub attenuation: Attenuation,
    /// Inner cone half-angle in radians (spot)
    pub inner_cutoff: f32,
    /// Outer cone half-angle in radians (spot)
    pub outer_cutoff: f32,
    /// Far plane of the shadow frustum (point/spot)
    pub range: f32,
    casts_shadow: Cell<bool>,
    /// Near plane override for the shadow projection
    pub shadow_near: Option<f32>,
    /// Far plane override for the shadow projection
    pub shadow_far: Option<f32>,
    shadow: RefCell<Option<ShadowMap>>,
}

impl Light {
    fn with_kind(kind: LightKind, transform: Mat4, color: Vec3) -> Self {
        Self {
            kind,
            transform: Cell::new(transform),
            color,
            intensity: 1.0,
            attenuation: Attenuation::default(),
            inner_cutoff: 0.0,
            outer_cutoff: 0.0,
            range: 100.0,
            casts_shadow: Cell::new(false),
            shadow_near: None,
            shadow_far: None,
            shadow: RefCell::new(None),
        }
    }

    /// Ambient light
    pub fn ambient(color: Vec3) -> Self {
        Self::with_kind(LightKind::Ambient, Mat4::identity(), color)
    }

    /// Directional light shining along `direction`
    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Self::with_kind(LightKind::Directional, oriented(Vec3::zeros(), direction), color)
    }

    /// Point light
    pub fn point(position: Vec3, color: Vec3, range: f32) -> Self {
        let mut light = Self::with_kind(LightKind::Point, Mat4::new_translation(&position), color);
        light.range = range;
        light
    }

    /// Spot light; cutoffs are cone half-angles in radians
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        range: f32,
        inner_cutoff: f32,
        outer_cutoff: f32,
    ) -> Self {
        let mut light = Self::with_kind(LightKind::Spot, oriented(position, direction), color);
        light.range = range;
        light.inner_cutoff = inner_cutoff.min(outer_cutoff);
        light.outer_cutoff = outer_cutoff;
        light
    }

    /// Enable or disable shadow casting
    pub fn with_shadows(self, enabled: bool) -> Self {
        self.casts_shadow.set(enabled);
        self
    }

    /// Override the shadow projection near/far planes
    pub fn with_shadow_planes(mut self, near: f32, far: f32) -> Self {
        self.shadow_near = Some(near);
        self.shadow_far = Some(far);
        self
    }

    /// Set the intensity multiplier
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// World transform (written by the scene traversal)
    pub fn transform(&self) -> Mat4 {
        self.transform.get()
    }

    /// Update the world transform
    pub fn set_transform(&self, transform: Mat4) {
        self.transform.set(transform);
    }

    /// Toggle shadow casting at runtime
    pub fn set_casts_shadow(&self, enabled: bool) {
        self.casts_shadow.set(enabled);
    }

    /// True when the light wants a shadow this frame
    pub fn casts_shadow(&self) -> bool {
        self.casts_shadow.get() && self.kind.can_cast_shadow()
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.transform().translation_part()
    }

    /// World direction the light points at (local -Z)
    pub fn direction(&self) -> Vec3 {
        let forward = self.transform() * Vec4::new(0.0, 0.0, -1.0, 0.0);
        let forward = forward.xyz();
        if forward.norm_squared() > 0.0 { forward.normalize() } else { -Vec3::z() }
    }

    /// Shadow map, if one was ever created
    pub fn shadow_map(&self) -> Ref<'_, Option<ShadowMap>> {
        self.shadow.borrow()
    }

    /// True once the shadow map exists
    pub fn has_shadow_map(&self) -> bool {
        self.shadow.borrow().is_some()
    }

    /// Shadow map, created on first access
    pub fn shadow_map_mut(self: &Rc<Self>) -> RefMut<'_, ShadowMap> {
        let owner = Rc::downgrade(self);
        RefMut::map(self.shadow.borrow_mut(), |slot| {
            slot.get_or_insert_with(|| {
                log::debug!("Creating shadow map for {:?} light", self.kind);
                ShadowMap::new(owner)
            })
        })
    }
}

/// Rigid transform at `position` whose local -Z axis points along `direction`
fn oriented(position: Vec3, direction: Vec3) -> Mat4 {
    let direction = if direction.norm_squared() > 0.0 { direction.normalize() } else { -Vec3::z() };
    Mat4::look_at(position, position + direction, Vec3::y())
        .try_inverse()
        .unwrap_or_else(|| Mat4::new_translation(&position))
}

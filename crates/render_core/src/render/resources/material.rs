//! Material description consumed by the passes
//!
//! The pipeline only reads materials. Classification uses the flags, the draw
//! loop hands the whole material to [`Device::bind_material`] which applies
//! textures, scalars and depth/blend/cull state in one aggregate bind.
//!
//! [`Device::bind_material`]: crate::render::device::Device::bind_material

use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

use crate::foundation::math::Vec3;
use crate::render::device::TextureId;

/// Unique identifier for materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    /// Classification flags read by the render queue
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        /// Alpha blending enabled
        const ALPHA = 1 << 0;
        /// Drawn into shadow maps
        const CASTS_SHADOWS = 1 << 1;
        /// Sampled against shadow maps when lit
        const RECEIVES_SHADOWS = 1 << 2;
        /// Drawn in the depth-only occluder stage
        const OCCLUDER = 1 << 3;
    }
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self::CASTS_SHADOWS | Self::RECEIVES_SHADOWS
    }
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunction {
    /// Pass when closer
    #[default]
    Less,
    /// Pass when closer or equal
    LessEqual,
    /// Always pass
    Always,
}

/// Depth test/write state pushed with the material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    /// Depth testing enabled
    pub test: bool,
    /// Depth writes enabled
    pub write: bool,
    /// Comparison used when testing
    pub compare: CompareFunction,
}

impl Default for DepthState {
    fn default() -> Self {
        Self { test: true, write: true, compare: CompareFunction::Less }
    }
}

/// Color blending state pushed with the material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// No blending
    #[default]
    Opaque,
    /// `src * a + dst * (1 - a)`
    Alpha,
    /// `src + dst`
    Additive,
}

/// Face culling state pushed with the material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// Draw both faces
    None,
    /// Cull back faces
    #[default]
    Back,
    /// Cull front faces
    Front,
}

/// Texture maps referenced by a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialTextures {
    /// Base color map
    pub color: Option<TextureId>,
    /// Tangent-space normal map
    pub normal: Option<TextureId>,
    /// Specular intensity map
    pub specular: Option<TextureId>,
}

/// Material properties for scene rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    id: MaterialId,
    /// Optional name for debugging
    pub name: Option<String>,
    /// Classification flags
    pub flags: MaterialFlags,
    /// Registry key of a custom program, `None` uses the pass fallback
    pub program: Option<String>,
    /// Texture maps
    pub textures: MaterialTextures,
    /// Ambient reflectance
    pub ambient: Vec3,
    /// Diffuse reflectance
    pub diffuse: Vec3,
    /// Specular reflectance
    pub specular: Vec3,
    /// Specular exponent
    pub shininess: f32,
    /// Opacity used when [`MaterialFlags::ALPHA`] is set
    pub opacity: f32,
    /// Depth state
    pub depth: DepthState,
    /// Blend state
    pub blend: BlendMode,
    /// Cull state
    pub cull: CullMode,
}

impl Material {
    /// Create a new opaque material that casts and receives shadows
    pub fn new() -> Self {
        Self {
            id: MaterialId::next(),
            name: None,
            flags: MaterialFlags::default(),
            program: None,
            textures: MaterialTextures::default(),
            ambient: Vec3::new(0.1, 0.1, 0.1),
            diffuse: Vec3::new(0.8, 0.8, 0.8),
            specular: Vec3::new(0.5, 0.5, 0.5),
            shininess: 32.0,
            opacity: 1.0,
            depth: DepthState::default(),
            blend: BlendMode::Opaque,
            cull: CullMode::Back,
        }
    }

    /// Unique id, part of the queue batch key
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Set the material name for debugging
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the classification flags
    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Enable alpha blending with the given opacity
    pub fn with_alpha(mut self, opacity: f32) -> Self {
        self.flags.insert(MaterialFlags::ALPHA);
        self.opacity = opacity.clamp(0.0, 1.0);
        self.blend = BlendMode::Alpha;
        self.depth.write = false;
        self
    }

    /// Toggle shadow casting
    pub fn with_casts_shadows(mut self, enabled: bool) -> Self {
        self.flags.set(MaterialFlags::CASTS_SHADOWS, enabled);
        self
    }

    /// Toggle shadow receiving
    pub fn with_receives_shadows(mut self, enabled: bool) -> Self {
        self.flags.set(MaterialFlags::RECEIVES_SHADOWS, enabled);
        self
    }

    /// Toggle the occluder stage
    pub fn with_occluder(mut self, enabled: bool) -> Self {
        self.flags.set(MaterialFlags::OCCLUDER, enabled);
        self
    }

    /// Use a custom program instead of the pass fallback
    pub fn with_program(mut self, key: impl Into<String>) -> Self {
        self.program = Some(key.into());
        self
    }

    /// Set the diffuse color
    pub fn with_diffuse(mut self, r: f32, g: f32, b: f32) -> Self {
        self.diffuse = Vec3::new(r, g, b);
        self
    }

    /// Attach a base color texture
    pub fn with_color_map(mut self, texture: TextureId) -> Self {
        self.textures.color = Some(texture);
        self
    }

    /// Attach a normal map
    pub fn with_normal_map(mut self, texture: TextureId) -> Self {
        self.textures.normal = Some(texture);
        self
    }

    /// Attach a specular map
    pub fn with_specular_map(mut self, texture: TextureId) -> Self {
        self.textures.specular = Some(texture);
        self
    }

    /// Alpha blending enabled
    pub fn has_alpha(&self) -> bool {
        self.flags.contains(MaterialFlags::ALPHA)
    }

    /// Drawn into shadow maps
    pub fn casts_shadows(&self) -> bool {
        self.flags.contains(MaterialFlags::CASTS_SHADOWS)
    }

    /// Sampled against shadow maps
    pub fn receives_shadows(&self) -> bool {
        self.flags.contains(MaterialFlags::RECEIVES_SHADOWS)
    }

    /// Drawn in the occluder stage
    pub fn is_occluder(&self) -> bool {
        self.flags.contains(MaterialFlags::OCCLUDER)
    }

    /// Carries its own program
    pub fn has_custom_program(&self) -> bool {
        self.program.is_some()
    }

    /// Registry key of the custom program
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

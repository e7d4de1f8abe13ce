//! Handle and value types exchanged with the device

use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Device handle of a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Device handle of a texture (including frame target attachments)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Device handle of a vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Device handle of an offscreen frame target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameTargetId(pub u32);

/// Intended use of a buffer created through the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex attributes
    Vertex,
    /// 32-bit indices
    Index,
}

/// Integer pixel rectangle used for viewport and scissor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl PixelRect {
    /// Create a rectangle
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle at the origin covering `width` x `height`
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Number of covered pixels
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Clear values applied when a frame target is bound for writing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    /// RGBA clear color, `None` keeps the color attachments
    pub color: Option<[f32; 4]>,
    /// Depth clear value, `None` keeps the depth attachment
    pub depth: Option<f32>,
}

impl ClearValue {
    /// Clear color to `color` and depth to 1.0
    pub const fn color_and_depth(color: [f32; 4]) -> Self {
        Self { color: Some(color), depth: Some(1.0) }
    }

    /// Clear only the depth attachment
    pub const fn depth_only() -> Self {
        Self { color: None, depth: Some(1.0) }
    }
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::color_and_depth([0.0, 0.0, 0.0, 1.0])
    }
}

/// A single shader uniform value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `bool`
    Bool(bool),
    /// `int`
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat3`
    Mat3(Mat3),
    /// `mat4`
    Mat4(Mat4),
}

macro_rules! uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

uniform_from! {
    bool => Bool,
    i32 => Int,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
}

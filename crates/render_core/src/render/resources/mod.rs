//! Resources referenced by the render queue and the passes
//!
//! - **Material**: read-only surface description and classification flags
//! - **Geometry**: primitives (device buffers) and the scene geometry owning them
//! - **Light**: light records with their lazily created shadow maps
//! - **FrameTarget**: offscreen targets and the per-pass target cache
//! - **Viewport**: relative/fixed rectangles used for atlas packing

pub mod frame_target;
pub mod geometry;
pub mod light;
pub mod material;
pub mod viewport;

pub use frame_target::{
    Attachment, AttachmentDescriptor, AttachmentName, FrameTarget, FrameTargetCache,
    FrameTargetDescriptor, TargetPurpose, TextureFormat,
};
pub use geometry::{Geometry, Primitive, PrimitiveId, RenderLayer, Topology};
pub use light::{Attenuation, Light, LightKind};
pub use material::{
    BlendMode, CompareFunction, CullMode, DepthState, Material, MaterialFlags, MaterialId,
    MaterialTextures,
};
pub use viewport::{ScalingMode, ViewportRect};

//! # Rendering System
//!
//! Backend-agnostic scene rendering core. The traversal fills a
//! [`RenderQueue`] once per camera per frame; a [`RenderPass`] then consumes
//! the queue and issues bind/draw traffic against a [`Device`].
//!
//! ## Architecture
//!
//! - **Device**: capability boundary over the graphics API, plus the
//!   [`BindScope`] guard that pairs every bind with its unbind
//! - **Resources**: materials, primitives, geometry, lights, frame targets
//! - **Queue**: per-frame bucket classification of renderables and lights
//! - **Shadow**: per-light shadow maps packed into a shared atlas
//! - **Passes**: shadow, forward/standard scene passes, deferred + compositor
//! - **Pipeline**: owns a pass and applies the caller's recovery policy
//!
//! ## Frame order
//!
//! `ShadowMapCompute → Occluders → OpaqueShaded → Translucent → Screen →
//! [ImageEffectChain]` for the scene passes; the deferred pass replaces the
//! middle with `GBuffer → Compose → [Ssao] → Present`.

pub mod camera;
pub mod device;
pub mod pass;
pub mod pipeline;
pub mod program;
pub mod queue;
pub mod resources;
pub mod shadow;

#[cfg(test)]
mod tests;

pub use camera::Camera;
pub use device::{
    BindScope, Device, RecordingDevice,
    BufferId, ProgramId, TextureId, FrameTargetId, PixelRect, ClearValue, UniformValue,
};
pub use pass::{
    FrameStats, PassKind, RenderPass, Stage,
    ScenePass, ScenePassParams, ShadowPass, DeferredPass, Compositor,
    ImageEffect, ImageEffectChain,
};
pub use pipeline::{RenderPipeline, RecoveryPolicy};
pub use program::ProgramRegistry;
pub use queue::{Bucket, BatchKey, Renderable, RenderQueue};
pub use resources::{
    Material, MaterialFlags, MaterialId,
    Primitive, PrimitiveId, Geometry, RenderLayer, Topology,
    Light, LightKind, Attenuation,
    FrameTarget, FrameTargetDescriptor, AttachmentName, TextureFormat,
    ViewportRect, ScalingMode,
};
pub use shadow::{ShadowMap, ShadowAtlasPacker, AtlasLayout, AtlasAssignment};

use thiserror::Error;

/// Errors raised by the render pipeline
///
/// A `render()` call returns [`RenderError::Configuration`] and
/// [`RenderError::Device`], plus [`RenderError::InvariantViolation`] when a
/// draw is issued through a scope with no program bound. Per-object and
/// per-frame degradations are logged and counted in [`FrameStats`] instead:
/// a skipped object is logged as [`RenderError::MissingResource`] and an
/// overfull atlas as [`RenderError::CapacityExceeded`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A program the pass cannot run without is not registered
    #[error("Configuration error: {pass} pass requires program '{program}'")]
    Configuration {
        /// Pass that needed the program
        pass: &'static str,
        /// Well-known registry key of the program
        program: String,
    },

    /// A per-object resource (program, geometry) is unusable
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// More shadow casters than atlas cells this frame
    #[error("Shadow atlas capacity exceeded: {dropped} of {requested} casting lights left unshadowed")]
    CapacityExceeded {
        /// Casting lights seen this frame
        requested: usize,
        /// Lights that got no cell
        dropped: usize,
    },

    /// Programmer error in the bind/draw discipline
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The backend failed an operation
    #[error("Device error: {0}")]
    Device(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

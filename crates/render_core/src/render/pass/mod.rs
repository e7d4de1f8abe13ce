//! # Render passes
//!
//! A pass consumes one frame's [`RenderQueue`] and drives the [`Device`].
//! The four pass kinds share one contract, [`RenderPass`]:
//!
//! - [`ScenePass`]: forward and standard rendering, one executor configured
//!   by [`ScenePassParams`]
//! - [`DeferredPass`]: G-buffer fill, then the [`Compositor`] chain
//! - [`ShadowPass`]: packs casting lights into the shadow atlas and renders
//!   their depth; also run as the first stage of the other passes
//!
//! Offscreen targets are created lazily, once per `(pass, purpose)`, and kept
//! across frames by the pass that created them.

pub mod compositor;
pub mod deferred;
pub mod draw;
pub mod effects;
pub mod quad;
pub mod scene;
pub mod shadow;

pub use compositor::Compositor;
pub use deferred::DeferredPass;
pub use draw::{ShadowEntry, ShadowOutput};
pub use effects::{ImageEffect, ImageEffectChain};
pub use quad::ScreenQuad;
pub use scene::{ScenePass, ScenePassParams};
pub use shadow::ShadowPass;

use crate::render::camera::Camera;
use crate::render::device::Device;
use crate::render::queue::RenderQueue;
use crate::render::RenderResult;

/// Pass kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Lit, shadowed scene rendering
    Forward,
    /// Lit, shadowed scene rendering with the standard fallback program
    Standard,
    /// G-buffer plus compositing
    Deferred,
    /// Shadow atlas only
    Shadow,
}

impl PassKind {
    /// Name used in logs and configuration errors
    pub const fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Standard => "standard",
            Self::Deferred => "deferred",
            Self::Shadow => "shadow",
        }
    }
}

/// Stages a pass can run, recorded in [`FrameStats::stages`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Shadow atlas packing and depth rendering
    ShadowMapCompute,
    /// Depth-only occluders
    Occluders,
    /// Opaque and shaded objects
    OpaqueShaded,
    /// Alpha-blended and custom-program objects
    Translucent,
    /// Screen-space overlays
    Screen,
    /// Post-processing chain
    ImageEffects,
    /// Depth pre-pass of the deferred pass
    DepthPrepass,
    /// G-buffer fill
    GBuffer,
    /// Deferred lighting
    Compose,
    /// Ambient occlusion and its blend
    Ssao,
    /// Copy to the presented target
    Present,
}

/// What a `render` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls issued
    pub draw_calls: usize,
    /// Renderables skipped (missing program, dead geometry)
    pub skipped_objects: usize,
    /// Lights packed into the shadow atlas
    pub shadowed_lights: usize,
    /// Casting lights left unshadowed for lack of atlas space
    pub dropped_lights: usize,
    /// Stages run, in order
    pub stages: Vec<Stage>,
}

impl FrameStats {
    /// True when `stage` ran
    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Position of `stage` in the run order
    pub fn stage_index(&self, stage: Stage) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage)
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        log::trace!("Stage {:?}", stage);
        self.stages.push(stage);
    }
}

/// Contract shared by every pass
pub trait RenderPass {
    /// Kind of this pass
    fn kind(&self) -> PassKind;

    /// Render one frame of `queue` as seen from `camera`
    ///
    /// Per-object problems are logged and counted in the returned stats; only
    /// configuration and device failures are returned as errors.
    fn render(&mut self, device: &mut dyn Device, queue: &RenderQueue, camera: &Camera) -> RenderResult<FrameStats>;
}

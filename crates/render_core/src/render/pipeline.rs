//! Render pipeline
//!
//! Owns one pass and drives it frame by frame. The caller picks how a
//! configuration error surfaces through [`RecoveryPolicy`].

use std::rc::Rc;

use crate::config::RendererConfig;
use crate::render::camera::Camera;
use crate::render::device::Device;
use crate::render::pass::{DeferredPass, FrameStats, PassKind, RenderPass, ScenePass};
use crate::render::program::ProgramRegistry;
use crate::render::queue::RenderQueue;
use crate::render::{RenderError, RenderResult};

/// What to do when a frame fails with a configuration error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Return the error to the caller
    #[default]
    Propagate,
    /// Log the error and report an empty frame
    SkipFrame,
}

/// A pass plus its frame loop bookkeeping
pub struct RenderPipeline {
    pass: Box<dyn RenderPass>,
    policy: RecoveryPolicy,
    frames: u64,
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("kind", &self.pass.kind())
            .field("policy", &self.policy)
            .field("frames", &self.frames)
            .finish()
    }
}

impl RenderPipeline {
    /// Wrap an existing pass
    pub fn new(pass: Box<dyn RenderPass>) -> Self {
        Self {
            pass,
            policy: RecoveryPolicy::default(),
            frames: 0,
        }
    }

    /// Lit, shadowed forward rendering
    pub fn forward(config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        Self::new(Box::new(ScenePass::forward(config, programs)))
    }

    /// Lit, shadowed rendering with the standard fallback program
    pub fn standard(config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        Self::new(Box::new(ScenePass::standard(config, programs)))
    }

    /// G-buffer rendering with compositing
    pub fn deferred(config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        Self::new(Box::new(DeferredPass::new(config, programs)))
    }

    /// Set the recovery policy
    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Kind of the owned pass
    pub fn kind(&self) -> PassKind {
        self.pass.kind()
    }

    /// Current recovery policy
    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    /// Frames rendered successfully or skipped
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Render one frame
    pub fn render_frame(
        &mut self,
        device: &mut dyn Device,
        queue: &RenderQueue,
        camera: &Camera,
    ) -> RenderResult<FrameStats> {
        let stats = match self.pass.render(device, queue, camera) {
            Ok(stats) => stats,
            Err(err @ RenderError::Configuration { .. }) if self.policy == RecoveryPolicy::SkipFrame => {
                log::error!("Frame {} skipped: {}", self.frames, err);
                FrameStats::default()
            }
            Err(err) => return Err(err),
        };
        self.frames += 1;
        log::debug!(
            "Frame {} ({}): {} draws, {} skipped, {} shadowed, {} dropped",
            self.frames,
            self.pass.kind().name(),
            stats.draw_calls,
            stats.skipped_objects,
            stats.shadowed_lights,
            stats.dropped_lights
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::device::{BufferId, RecordingDevice};
    use crate::render::program::keys;
    use crate::render::resources::{Geometry, Material, Primitive};

    fn queue(geometry: &Rc<Geometry>) -> RenderQueue {
        let mut queue = RenderQueue::new();
        queue.push(
            Some(Rc::new(Material::new())),
            Some(Rc::new(Primitive::indexed(BufferId(1), BufferId(2), 36))),
            geometry,
            Mat4::identity(),
            false,
        );
        queue
    }

    fn without(key: &str) -> Rc<ProgramRegistry> {
        let mut registry = ProgramRegistry::with_builtin_programs();
        registry.unregister(key);
        Rc::new(registry)
    }

    #[test]
    fn test_constructors_pick_pass_kind() {
        let programs = Rc::new(ProgramRegistry::with_builtin_programs());
        let config = RendererConfig::default();
        assert_eq!(RenderPipeline::forward(config.clone(), Rc::clone(&programs)).kind(), PassKind::Forward);
        assert_eq!(RenderPipeline::standard(config.clone(), Rc::clone(&programs)).kind(), PassKind::Standard);
        assert_eq!(RenderPipeline::deferred(config, programs).kind(), PassKind::Deferred);
    }

    #[test]
    fn test_propagate_returns_configuration_error() {
        let geometry = Rc::new(Geometry::new("crate"));
        let queue = queue(&geometry);
        let mut pipeline = RenderPipeline::deferred(RendererConfig::default(), without(keys::GBUFFER));
        let mut device = RecordingDevice::new();

        let err = pipeline.render_frame(&mut device, &queue, &Camera::default()).unwrap_err();
        assert!(matches!(err, RenderError::Configuration { pass: "deferred", .. }));
        assert_eq!(pipeline.frames(), 0);
    }

    #[test]
    fn test_skip_frame_reports_empty_stats() {
        let geometry = Rc::new(Geometry::new("crate"));
        let queue = queue(&geometry);
        let mut pipeline = RenderPipeline::deferred(RendererConfig::default(), without(keys::BLIT))
            .with_policy(RecoveryPolicy::SkipFrame);
        let mut device = RecordingDevice::new();

        let stats = pipeline.render_frame(&mut device, &queue, &Camera::default()).unwrap();
        assert_eq!(stats, FrameStats::default());
        assert_eq!(pipeline.frames(), 1);
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn test_frames_counted() {
        let geometry = Rc::new(Geometry::new("crate"));
        let queue = queue(&geometry);
        let mut pipeline = RenderPipeline::forward(RendererConfig::default(), Rc::new(ProgramRegistry::with_builtin_programs()));
        let mut device = RecordingDevice::new();
        for _ in 0..3 {
            let stats = pipeline.render_frame(&mut device, &queue, &Camera::default()).unwrap();
            assert_eq!(stats.draw_calls, 1);
        }
        assert_eq!(pipeline.frames(), 3);
        assert!(device.is_balanced());
    }
}

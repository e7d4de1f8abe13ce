//! Deferred pass
//!
//! `ShadowMapCompute → [DepthPrepass] → GBuffer → Compose → [Ssao] → Present`
//!
//! Only the opaque family is rendered; translucent and screen renderables
//! belong to the scene passes. The G-buffer, compose and blit programs are
//! mandatory: the pass reports a configuration error before touching the
//! device when one of them is missing.

use std::rc::Rc;

use crate::config::RendererConfig;
use crate::render::camera::Camera;
use crate::render::device::{BindScope, Device, PixelRect};
use crate::render::program::{keys, ProgramRegistry};
use crate::render::queue::{Bucket, RenderQueue};
use crate::render::resources::{
    AttachmentName, FrameTargetCache, FrameTargetDescriptor, TargetPurpose, TextureFormat,
};
use crate::render::RenderResult;

use super::compositor::{CompositeInputs, Compositor};
use super::draw::{draw_renderable, DrawContext};
use super::quad::ScreenQuad;
use super::shadow::ShadowPass;
use super::{FrameStats, PassKind, RenderPass, Stage};

const OPAQUE_FAMILY: [Bucket; 2] = [Bucket::Opaque, Bucket::ShadedObjects];

/// Deferred renderer
#[derive(Debug)]
pub struct DeferredPass {
    config: RendererConfig,
    programs: Rc<ProgramRegistry>,
    shadow: ShadowPass,
    compositor: Compositor,
    targets: FrameTargetCache,
    quad: ScreenQuad,
}

impl DeferredPass {
    /// Create the pass; targets are allocated on the first frame
    pub fn new(config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        let shadow = ShadowPass::new(config.shadow.clone(), Rc::clone(&programs));
        let compositor = Compositor::new(config.ssao.clone(), config.lighting_enabled);
        Self {
            config,
            programs,
            shadow,
            compositor,
            targets: FrameTargetCache::new(),
            quad: ScreenQuad::new(),
        }
    }

    /// Targets created by this pass
    pub fn targets(&self) -> &FrameTargetCache {
        &self.targets
    }

    /// Compositing chain
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }
}

impl RenderPass for DeferredPass {
    fn kind(&self) -> PassKind {
        PassKind::Deferred
    }

    fn render(&mut self, device: &mut dyn Device, queue: &RenderQueue, camera: &Camera) -> RenderResult<FrameStats> {
        let name = PassKind::Deferred.name();
        let gbuffer_program = self.programs.require(keys::GBUFFER, name)?;
        let compose_program = self.programs.require(keys::COMPOSE, name)?;
        let blit_program = self.programs.require(keys::BLIT, name)?;

        let mut stats = FrameStats::default();
        let (width, height) = camera.viewport;
        let projection = camera.projection_matrix();
        let view = camera.view_matrix();

        let shadows = if self.config.shadow_mapping_enabled {
            self.shadow.compute(device, queue, camera, &mut stats)?
        } else {
            None
        };

        let gbuffer = self.targets.ensure(device, PassKind::Deferred, TargetPurpose::GBuffer, width, height, || {
            FrameTargetDescriptor::new("gbuffer", width, height)
                .with_attachment(AttachmentName::Position, TextureFormat::Rgba32F)
                .with_attachment(AttachmentName::Normal, TextureFormat::Rgba16F)
                .with_attachment(AttachmentName::Albedo, TextureFormat::Rgba8)
                .with_attachment(AttachmentName::Depth, TextureFormat::Depth32F)
        })?;

        {
            let mut scope = BindScope::new(device);
            scope.frame_target(&gbuffer);
            scope.viewport(PixelRect::full(width, height));
            scope.clear(&gbuffer.clear());

            if self.config.depth_prepass {
                match self.programs.get(keys::DEPTH) {
                    Some(depth) => {
                        stats.enter(Stage::DepthPrepass);
                        let mut ctx = DrawContext::fixed(depth, projection, view);
                        ctx.bind_material = false;
                        for bucket in OPAQUE_FAMILY {
                            for renderable in queue.renderables(bucket) {
                                draw_renderable(&mut scope, &ctx, renderable, &mut stats)?;
                            }
                        }
                    }
                    None => log::warn!("Depth pre-pass skipped: program '{}' is not registered", keys::DEPTH),
                }
            }

            stats.enter(Stage::GBuffer);
            let ctx = DrawContext::fixed(gbuffer_program, projection, view);
            for bucket in OPAQUE_FAMILY {
                for renderable in queue.renderables(bucket) {
                    draw_renderable(&mut scope, &ctx, renderable, &mut stats)?;
                }
            }
        }

        let ignored = queue.len(Bucket::Translucent) + queue.len(Bucket::Screen);
        if ignored > 0 {
            log::trace!("Deferred pass leaves {} translucent/screen renderables undrawn", ignored);
        }

        let quad = self.quad.ensure(device)?;
        let inputs = CompositeInputs {
            quad: &quad,
            gbuffer: &gbuffer,
            camera,
        };
        let lit = self.compositor.compose(
            device,
            &mut self.targets,
            compose_program,
            &inputs,
            queue.lights(),
            shadows.as_ref(),
            &mut stats,
        )?;
        let result = self
            .compositor
            .ssao(device, &mut self.targets, &self.programs, &inputs, lit, &mut stats)?;
        self.compositor.present(device, blit_program, &quad, &result, &mut stats)?;

        log::debug!(
            "deferred pass: {} draws, {} skipped, stages {:?}",
            stats.draw_calls,
            stats.skipped_objects,
            stats.stages
        );
        Ok(stats)
    }
}

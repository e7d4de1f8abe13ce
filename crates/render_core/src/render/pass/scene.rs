//! Forward and standard scene passes
//!
//! Both run the same stage sequence; [`ScenePassParams`] decides the
//! fallback program, whether lights are uploaded and whether the shadow stage
//! runs:
//!
//! `ShadowMapCompute → Occluders → OpaqueShaded → Translucent → Screen →
//! ImageEffects`

use std::cmp::Ordering;
use std::rc::Rc;

use crate::config::RendererConfig;
use crate::foundation::math::Mat4;
use crate::render::camera::Camera;
use crate::render::device::{BindScope, Device, PixelRect};
use crate::render::program::{keys, ProgramRegistry};
use crate::render::queue::{Bucket, RenderQueue, Renderable};
use crate::render::resources::{
    AttachmentName, FrameTargetCache, FrameTargetDescriptor, Light, TargetPurpose, TextureFormat,
};
use crate::render::RenderResult;

use super::draw::{draw_renderable, DrawContext};
use super::effects::{ImageEffect, ImageEffectChain};
use super::quad::ScreenQuad;
use super::shadow::ShadowPass;
use super::{FrameStats, PassKind, RenderPass, Stage};

/// What distinguishes the scene pass kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenePassParams {
    /// Reported pass kind
    pub kind: PassKind,
    /// Program used for materials without their own
    pub fallback_program: &'static str,
    /// Upload the frame's lights to lit stages
    pub lit: bool,
    /// Run the shadow stage and sample it for shaded objects
    pub shadowed: bool,
}

impl ScenePassParams {
    /// Lit and shadowed
    pub const fn forward() -> Self {
        Self {
            kind: PassKind::Forward,
            fallback_program: keys::FORWARD,
            lit: true,
            shadowed: true,
        }
    }

    /// Lit and shadowed, with the standard fallback program
    pub const fn standard() -> Self {
        Self {
            kind: PassKind::Standard,
            fallback_program: keys::STANDARD,
            lit: true,
            shadowed: true,
        }
    }
}

/// Scene pass executor
#[derive(Debug)]
pub struct ScenePass {
    params: ScenePassParams,
    config: RendererConfig,
    programs: Rc<ProgramRegistry>,
    shadow: ShadowPass,
    effects: ImageEffectChain,
    targets: FrameTargetCache,
    quad: ScreenQuad,
}

impl ScenePass {
    /// Pass driven by `params`
    pub fn new(params: ScenePassParams, config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        let shadow = ShadowPass::new(config.shadow.clone(), Rc::clone(&programs));
        Self {
            params,
            config,
            programs,
            shadow,
            effects: ImageEffectChain::new(),
            targets: FrameTargetCache::new(),
            quad: ScreenQuad::new(),
        }
    }

    /// Forward pass
    pub fn forward(config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        Self::new(ScenePassParams::forward(), config, programs)
    }

    /// Standard pass
    pub fn standard(config: RendererConfig, programs: Rc<ProgramRegistry>) -> Self {
        Self::new(ScenePassParams::standard(), config, programs)
    }

    /// Append a post-processing effect
    pub fn add_effect(&mut self, effect: ImageEffect) {
        log::debug!("{} pass: image effect '{}' attached", self.params.kind.name(), effect.name);
        self.effects.push(effect);
    }

    /// Attached effects
    pub fn effects(&self) -> &ImageEffectChain {
        &self.effects
    }

    /// Pass parameters
    pub fn params(&self) -> ScenePassParams {
        self.params
    }

    /// Targets created by this pass (the shadow atlas lives in [`ScenePass::shadow_pass`])
    pub fn targets(&self) -> &FrameTargetCache {
        &self.targets
    }

    /// Embedded shadow stage
    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow
    }

    fn lights<'q>(&self, queue: &'q RenderQueue) -> &'q [Rc<Light>] {
        if self.params.lit && self.config.lighting_enabled {
            queue.lights()
        } else {
            &[]
        }
    }
}

/// Back-to-front order by view depth
fn sort_back_to_front(renderables: &mut [&Renderable], view: &Mat4) {
    let depth = |r: &Renderable| (view * r.world.column(3)).z;
    renderables.sort_by(|a, b| depth(a).partial_cmp(&depth(b)).unwrap_or(Ordering::Equal));
}

impl RenderPass for ScenePass {
    fn kind(&self) -> PassKind {
        self.params.kind
    }

    fn render(&mut self, device: &mut dyn Device, queue: &RenderQueue, camera: &Camera) -> RenderResult<FrameStats> {
        self.programs.require(self.params.fallback_program, self.params.kind.name())?;

        let mut stats = FrameStats::default();
        let (width, height) = camera.viewport;
        let projection = camera.projection_matrix();
        let view = camera.view_matrix();

        let shadows = if self.params.shadowed && self.config.shadow_mapping_enabled {
            self.shadow.compute(device, queue, camera, &mut stats)?
        } else {
            None
        };

        let scene_target = if self.effects.is_empty() {
            None
        } else {
            Some(self.targets.ensure(device, self.params.kind, TargetPurpose::SceneColor, width, height, || {
                FrameTargetDescriptor::new("scene_color", width, height)
                    .with_attachment(AttachmentName::Color, TextureFormat::Rgba16F)
                    .with_attachment(AttachmentName::Depth, TextureFormat::Depth32F)
            })?)
        };

        {
            let mut scope = BindScope::new(device);
            if let Some(target) = &scene_target {
                scope.frame_target(target);
                scope.viewport(PixelRect::full(width, height));
                scope.clear(&target.clear());
            } else {
                scope.viewport(PixelRect::full(width, height));
                scope.clear(&Default::default());
            }

            if queue.len(Bucket::Occluder) > 0 {
                match self.programs.get(keys::DEPTH) {
                    Some(depth) => {
                        stats.enter(Stage::Occluders);
                        let mut ctx = DrawContext::fixed(depth, projection, view);
                        ctx.bind_material = false;
                        for renderable in queue.renderables(Bucket::Occluder) {
                            draw_renderable(&mut scope, &ctx, renderable, &mut stats)?;
                        }
                    }
                    None => log::warn!("Occluder stage skipped: program '{}' is not registered", keys::DEPTH),
                }
            }

            let lights = self.lights(queue);
            let lit = DrawContext::lit(&self.programs, self.params.fallback_program, lights, projection, view);

            if queue.len(Bucket::Opaque) + queue.len(Bucket::ShadedObjects) > 0 {
                stats.enter(Stage::OpaqueShaded);
                for renderable in queue.renderables(Bucket::Opaque) {
                    draw_renderable(&mut scope, &lit, renderable, &mut stats)?;
                }
                let shaded = lit.with_shadows(shadows.as_ref());
                for renderable in queue.renderables(Bucket::ShadedObjects) {
                    draw_renderable(&mut scope, &shaded, renderable, &mut stats)?;
                }
            }

            if queue.len(Bucket::Translucent) > 0 {
                stats.enter(Stage::Translucent);
                let mut translucent: Vec<&Renderable> = queue.renderables(Bucket::Translucent).collect();
                sort_back_to_front(&mut translucent, &view);
                for renderable in translucent {
                    draw_renderable(&mut scope, &lit, renderable, &mut stats)?;
                }
            }

            if queue.len(Bucket::Screen) > 0 {
                stats.enter(Stage::Screen);
                let ctx = DrawContext::lit(&self.programs, keys::SCREEN, &[], camera.screen_projection(), Mat4::identity());
                for renderable in queue.renderables(Bucket::Screen) {
                    draw_renderable(&mut scope, &ctx, renderable, &mut stats)?;
                }
            }
        }

        if let Some(source) = &scene_target {
            let quad = self.quad.ensure(device)?;
            self.effects.apply(
                device,
                &mut self.targets,
                self.params.kind,
                source,
                &quad,
                &self.programs,
                &mut stats,
            )?;
        }

        log::debug!(
            "{} pass: {} draws, {} skipped, stages {:?}",
            self.params.kind.name(),
            stats.draw_calls,
            stats.skipped_objects,
            stats.stages
        );
        Ok(stats)
    }
}

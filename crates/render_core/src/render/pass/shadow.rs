//! Shadow pass
//!
//! Packs this frame's casting lights into the shared atlas, computes their
//! light-space matrices and renders the shadow casters once per
//! sub-viewport. The atlas target only exists once some light has cast a
//! shadow.

use std::rc::Rc;

use crate::config::ShadowConfig;
use crate::foundation::math::Mat4;
use crate::render::camera::Camera;
use crate::render::device::{BindScope, ClearValue, Device, PixelRect};
use crate::render::program::{keys, ProgramRegistry};
use crate::render::queue::{Bucket, RenderQueue};
use crate::render::resources::{
    AttachmentName, FrameTargetCache, FrameTargetDescriptor, TargetPurpose, TextureFormat,
};
use crate::render::shadow::{projection, ShadowAtlasPacker, ShadowBias};
use crate::render::{RenderError, RenderResult};

use super::draw::{draw_renderable, DrawContext, ShadowEntry, ShadowOutput};
use super::{FrameStats, PassKind, RenderPass, Stage};

/// Shadow atlas pass
#[derive(Debug)]
pub struct ShadowPass {
    config: ShadowConfig,
    programs: Rc<ProgramRegistry>,
    packer: ShadowAtlasPacker,
    targets: FrameTargetCache,
}

impl ShadowPass {
    /// Create the pass; nothing is allocated until a light casts
    pub fn new(config: ShadowConfig, programs: Rc<ProgramRegistry>) -> Self {
        Self {
            config,
            programs,
            packer: ShadowAtlasPacker::new(),
            targets: FrameTargetCache::new(),
        }
    }

    /// Offscreen targets created so far
    pub fn targets(&self) -> &FrameTargetCache {
        &self.targets
    }

    /// Run the shadow stage; `None` when no light casts this frame
    pub fn compute(
        &mut self,
        device: &mut dyn Device,
        queue: &RenderQueue,
        camera: &Camera,
        stats: &mut FrameStats,
    ) -> RenderResult<Option<ShadowOutput>> {
        stats.enter(Stage::ShadowMapCompute);
        let casting = queue.casting_lights();
        if casting.is_empty() {
            log::trace!("No casting lights, shadow stage idle");
            return Ok(None);
        }
        let program = self.programs.require(keys::SHADOW_DEPTH, PassKind::Shadow.name())?;

        let layout = self.packer.pack(&casting);
        layout.apply();
        stats.shadowed_lights += layout.assignments.len();
        stats.dropped_lights += layout.dropped.len();
        if !layout.dropped.is_empty() {
            let err = RenderError::CapacityExceeded {
                requested: casting.len(),
                dropped: layout.dropped.len(),
            };
            log::debug!("{}", err);
        }

        let bias = ShadowBias {
            constant: self.config.bias_constant,
            slope: self.config.bias_slope,
        };
        for assignment in &layout.assignments {
            let matrices = projection::light_matrices(&assignment.light, Some(camera), &self.config);
            let mut map = assignment.light.shadow_map_mut();
            map.set_matrices(matrices.projections, matrices.view);
            map.set_cascade_splits(matrices.splits);
            map.set_bias(bias);
        }

        let size = self.config.atlas_size;
        let atlas = self.targets.ensure(
            device,
            PassKind::Shadow,
            TargetPurpose::ShadowAtlas,
            size,
            size,
            || {
                FrameTargetDescriptor::new("shadow_atlas", size, size)
                    .with_attachment(AttachmentName::Depth, TextureFormat::Depth32F)
                    .with_clear(ClearValue::depth_only())
            },
        )?;
        let atlas_texture = atlas.attachment(AttachmentName::Depth).ok_or_else(|| {
            RenderError::Device(format!("frame target '{}' has no depth attachment", atlas.label()))
        })?;

        {
            let mut scope = BindScope::new(device);
            scope.frame_target(&atlas);
            scope.viewport(PixelRect::full(size, size));
            scope.scissor(None);
            scope.clear(&atlas.clear());

            for assignment in &layout.assignments {
                let faces: Vec<(PixelRect, Mat4, Mat4)> = assignment
                    .light
                    .shadow_map()
                    .as_ref()
                    .map(|map| {
                        map.render_viewports()
                            .iter()
                            .enumerate()
                            .map(|(i, viewport)| (viewport.to_pixels(size, size), map.face_projection(i), map.view()))
                            .collect()
                    })
                    .unwrap_or_default();
                for (pixels, face_projection, view) in faces {
                    scope.viewport(pixels);
                    scope.scissor(Some(pixels));
                    let mut ctx = DrawContext::fixed(program, face_projection, view);
                    ctx.bind_material = false;
                    ctx.skip_skybox = true;
                    for renderable in queue.renderables(Bucket::ShadowCaster) {
                        if !renderable.material.casts_shadows() {
                            continue;
                        }
                        draw_renderable(&mut scope, &ctx, renderable, stats)?;
                    }
                }
            }
            scope.scissor(None);
        }

        let entries = layout
            .assignments
            .into_iter()
            .map(|assignment| ShadowEntry {
                slot: queue.light_slot(&assignment.light),
                light: assignment.light,
            })
            .collect();
        Ok(Some(ShadowOutput { atlas: atlas_texture, entries }))
    }
}

impl RenderPass for ShadowPass {
    fn kind(&self) -> PassKind {
        PassKind::Shadow
    }

    fn render(&mut self, device: &mut dyn Device, queue: &RenderQueue, camera: &Camera) -> RenderResult<FrameStats> {
        let mut stats = FrameStats::default();
        self.compute(device, queue, camera, &mut stats)?;
        Ok(stats)
    }
}

//! Deferred compositing chain
//!
//! `compose` lights the G-buffer into a color target with one full-screen
//! draw. The optional SSAO sub-chain computes occlusion from position and
//! normal into a single-channel target, then blends it into the lit color,
//! alternating between two accumulation targets. `present` copies the final
//! color to the presented target.

use std::rc::Rc;

use crate::config::SsaoConfig;
use crate::render::camera::Camera;
use crate::render::device::{BindScope, Device, PixelRect, ProgramId, TextureId};
use crate::render::program::{keys, ProgramRegistry};
use crate::render::resources::{
    AttachmentName, FrameTarget, FrameTargetCache, FrameTargetDescriptor, Light, Primitive, TargetPurpose,
    TextureFormat,
};
use crate::render::{RenderError, RenderResult};

use super::draw::{upload_lights, upload_shadows, ShadowOutput};
use super::effects::{blit_to_default, color_of};
use super::{FrameStats, PassKind, Stage};

const PASS: PassKind = PassKind::Deferred;

fn attachment(target: &FrameTarget, name: AttachmentName) -> RenderResult<TextureId> {
    target
        .attachment(name)
        .ok_or_else(|| RenderError::Device(format!("frame target '{}' has no {:?} attachment", target.label(), name)))
}

fn color_target(label: &'static str, width: u32, height: u32) -> FrameTargetDescriptor {
    FrameTargetDescriptor::new(label, width, height).with_attachment(AttachmentName::Color, TextureFormat::Rgba16F)
}

/// Inputs shared by the compositing draws
pub(crate) struct CompositeInputs<'a> {
    pub quad: &'a Rc<Primitive>,
    pub gbuffer: &'a FrameTarget,
    pub camera: &'a Camera,
}

/// G-buffer lighting plus SSAO
#[derive(Debug, Clone)]
pub struct Compositor {
    ssao: SsaoConfig,
    lighting_enabled: bool,
}

impl Compositor {
    /// Compositor with the given SSAO settings
    pub fn new(ssao: SsaoConfig, lighting_enabled: bool) -> Self {
        Self { ssao, lighting_enabled }
    }

    /// SSAO settings
    pub fn ssao_config(&self) -> &SsaoConfig {
        &self.ssao
    }

    /// Light the G-buffer into the lit color target
    pub(crate) fn compose(
        &self,
        device: &mut dyn Device,
        targets: &mut FrameTargetCache,
        program: ProgramId,
        inputs: &CompositeInputs<'_>,
        lights: &[Rc<Light>],
        shadows: Option<&ShadowOutput>,
        stats: &mut FrameStats,
    ) -> RenderResult<FrameTarget> {
        stats.enter(Stage::Compose);
        let (width, height) = inputs.gbuffer.size();
        let lit = targets.ensure(device, PASS, TargetPurpose::LitColor, width, height, || {
            color_target("deferred_lit", width, height)
        })?;
        let position = attachment(inputs.gbuffer, AttachmentName::Position)?;
        let normal = attachment(inputs.gbuffer, AttachmentName::Normal)?;
        let albedo = attachment(inputs.gbuffer, AttachmentName::Albedo)?;
        let depth = attachment(inputs.gbuffer, AttachmentName::Depth)?;

        let mut scope = BindScope::new(device);
        scope.frame_target(&lit);
        scope.viewport(PixelRect::full(width, height));
        scope.clear(&lit.clear());
        scope.program(program)?;
        scope.texture(0, position);
        scope.texture(1, normal);
        scope.texture(2, albedo);
        scope.texture(3, depth);
        scope.uniform("u_gposition", 0_i32);
        scope.uniform("u_gnormal", 1_i32);
        scope.uniform("u_galbedo", 2_i32);
        scope.uniform("u_gdepth", 3_i32);
        if self.lighting_enabled {
            upload_lights(&mut scope, lights);
        } else {
            scope.uniform("u_light_count", 0_i32);
        }
        if let Some(shadows) = shadows {
            upload_shadows(&mut scope, shadows);
        }
        scope.uniform("u_view", inputs.camera.view_matrix());
        scope.uniform("u_projection", inputs.camera.projection_matrix());
        scope.uniform("u_camera_position", inputs.camera.position);
        scope.primitive_buffers(inputs.quad);
        scope.draw(inputs.quad)?;
        stats.draw_calls += 1;
        Ok(lit)
    }

    /// Apply ambient occlusion to `lit`; returns the target holding the result
    ///
    /// Disabled or unsupported (missing programs) SSAO returns `lit` unchanged.
    pub(crate) fn ssao(
        &self,
        device: &mut dyn Device,
        targets: &mut FrameTargetCache,
        programs: &ProgramRegistry,
        inputs: &CompositeInputs<'_>,
        lit: FrameTarget,
        stats: &mut FrameStats,
    ) -> RenderResult<FrameTarget> {
        if !self.ssao.enabled {
            return Ok(lit);
        }
        let (Some(occlusion_program), Some(blend_program)) = (programs.get(keys::SSAO), programs.get(keys::SSAO_BLEND))
        else {
            log::warn!("SSAO skipped: '{}' or '{}' is not registered", keys::SSAO, keys::SSAO_BLEND);
            return Ok(lit);
        };
        stats.enter(Stage::Ssao);

        let (width, height) = lit.size();
        let occlusion = targets.ensure(device, PASS, TargetPurpose::Occlusion, width, height, || {
            FrameTargetDescriptor::new("ssao_occlusion", width, height)
                .with_attachment(AttachmentName::Occlusion, TextureFormat::R8)
        })?;
        let occlusion_texture = attachment(&occlusion, AttachmentName::Occlusion)?;

        {
            let mut scope = BindScope::new(device);
            scope.frame_target(&occlusion);
            scope.viewport(PixelRect::full(width, height));
            scope.clear(&occlusion.clear());
            scope.program(occlusion_program)?;
            scope.texture(0, attachment(inputs.gbuffer, AttachmentName::Position)?);
            scope.texture(1, attachment(inputs.gbuffer, AttachmentName::Normal)?);
            scope.uniform("u_gposition", 0_i32);
            scope.uniform("u_gnormal", 1_i32);
            scope.uniform("u_radius", self.ssao.radius);
            scope.uniform("u_bias", self.ssao.bias);
            scope.uniform("u_kernel_size", self.ssao.kernel_size as i32);
            scope.uniform("u_projection", inputs.camera.projection_matrix());
            scope.primitive_buffers(inputs.quad);
            scope.draw(inputs.quad)?;
            stats.draw_calls += 1;
        }

        let mut source = lit;
        for pass in 0..self.ssao.blend_passes.max(1) {
            let purpose = if pass % 2 == 0 { TargetPurpose::AccumulationA } else { TargetPurpose::AccumulationB };
            let label = if pass % 2 == 0 { "ssao_accumulation_a" } else { "ssao_accumulation_b" };
            let output = targets.ensure(device, PASS, purpose, width, height, || color_target(label, width, height))?;

            let mut scope = BindScope::new(device);
            scope.frame_target(&output);
            scope.viewport(PixelRect::full(width, height));
            scope.program(blend_program)?;
            scope.texture(0, color_of(&source)?);
            scope.texture(1, occlusion_texture);
            scope.uniform("u_color", 0_i32);
            scope.uniform("u_occlusion", 1_i32);
            scope.uniform("u_strength", self.ssao.strength);
            scope.primitive_buffers(inputs.quad);
            scope.draw(inputs.quad)?;
            stats.draw_calls += 1;
            drop(scope);

            source = output;
        }
        Ok(source)
    }

    /// Copy `source` to the presented target
    pub(crate) fn present(
        &self,
        device: &mut dyn Device,
        blit: ProgramId,
        quad: &Rc<Primitive>,
        source: &FrameTarget,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        stats.enter(Stage::Present);
        blit_to_default(device, blit, color_of(source)?, quad, source.size(), stats)
    }
}

//! Image effect chain
//!
//! Post-processing applied after the scene stages. The scene renders into a
//! color target; each effect draws a full-screen quad that samples the
//! previous result, alternating between two cached targets. The last effect
//! writes the presented (default) target.

use std::rc::Rc;

use crate::render::device::{BindScope, ClearValue, Device, PixelRect, ProgramId, TextureId, UniformValue};
use crate::render::program::{keys, ProgramRegistry};
use crate::render::resources::{
    AttachmentName, FrameTarget, FrameTargetCache, FrameTargetDescriptor, Primitive, TargetPurpose,
    TextureFormat,
};
use crate::render::{RenderError, RenderResult};

use super::{FrameStats, PassKind, Stage};

/// One post-processing step
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEffect {
    /// Name for logs
    pub name: String,
    /// Registry key of the effect's program
    pub program: String,
    /// Extra uniforms uploaded before the draw
    pub uniforms: Vec<(String, UniformValue)>,
}

impl ImageEffect {
    /// Effect without extra uniforms
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            uniforms: Vec::new(),
        }
    }

    /// Add a uniform
    pub fn with_uniform(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.uniforms.push((name.into(), value.into()));
        self
    }
}

/// Ordered list of effects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageEffectChain {
    effects: Vec<ImageEffect>,
}

impl ImageEffectChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect
    pub fn push(&mut self, effect: ImageEffect) {
        self.effects.push(effect);
    }

    /// Effects in order
    pub fn effects(&self) -> &[ImageEffect] {
        &self.effects
    }

    /// Number of effects
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True when nothing is attached
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Run the chain on `source` and present the result
    ///
    /// Effects whose program is missing are skipped with a warning. When none
    /// can run, `source` is copied to the presented target with the blit
    /// program.
    pub(crate) fn apply(
        &self,
        device: &mut dyn Device,
        targets: &mut FrameTargetCache,
        pass: PassKind,
        source: &FrameTarget,
        quad: &Rc<Primitive>,
        programs: &ProgramRegistry,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        stats.enter(Stage::ImageEffects);
        let runnable: Vec<(&ImageEffect, ProgramId)> = self
            .effects
            .iter()
            .filter_map(|effect| match programs.get(&effect.program) {
                Some(program) => Some((effect, program)),
                None => {
                    log::warn!("Image effect '{}' skipped: program '{}' is not registered", effect.name, effect.program);
                    None
                }
            })
            .collect();

        let (width, height) = source.size();
        let mut input = color_of(source)?;

        if runnable.is_empty() {
            let blit = programs.require(keys::BLIT, pass.name())?;
            return blit_to_default(device, blit, input, quad, (width, height), stats);
        }

        let last = runnable.len() - 1;
        for (index, (effect, program)) in runnable.into_iter().enumerate() {
            let output = if index == last {
                None
            } else {
                let purpose = if index % 2 == 0 { TargetPurpose::EffectPing } else { TargetPurpose::EffectPong };
                Some(targets.ensure(device, pass, purpose, width, height, || {
                    FrameTargetDescriptor::new(format!("effect_{purpose:?}").to_lowercase(), width, height)
                        .with_attachment(AttachmentName::Color, TextureFormat::Rgba16F)
                })?)
            };

            let mut scope = BindScope::new(device);
            if let Some(target) = &output {
                scope.frame_target(target);
            }
            scope.viewport(PixelRect::full(width, height));
            scope.program(program)?;
            scope.texture(0, input);
            scope.uniform("u_source", 0_i32);
            for (name, value) in &effect.uniforms {
                scope.uniform(name, *value);
            }
            scope.primitive_buffers(quad);
            scope.draw(quad)?;
            stats.draw_calls += 1;
            log::trace!("Image effect '{}' applied", effect.name);
            drop(scope);

            if let Some(target) = &output {
                input = color_of(target)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn color_of(target: &FrameTarget) -> RenderResult<TextureId> {
    target
        .attachment(AttachmentName::Color)
        .ok_or_else(|| RenderError::Device(format!("frame target '{}' has no color attachment", target.label())))
}

/// Copy `texture` to the presented target with a full-screen quad
pub(crate) fn blit_to_default(
    device: &mut dyn Device,
    blit: ProgramId,
    texture: TextureId,
    quad: &Rc<Primitive>,
    (width, height): (u32, u32),
    stats: &mut FrameStats,
) -> RenderResult<()> {
    let mut scope = BindScope::new(device);
    scope.viewport(PixelRect::full(width, height));
    scope.clear(&ClearValue::default());
    scope.program(blit)?;
    scope.texture(0, texture);
    scope.uniform("u_source", 0_i32);
    scope.primitive_buffers(quad);
    scope.draw(quad)?;
    stats.draw_calls += 1;
    Ok(())
}

//! Offscreen frame targets and the per-pass target cache
//!
//! A frame target's attachment list is fixed when the device creates it; only
//! its clear value and size change afterwards. Each pass owns a
//! [`FrameTargetCache`] keyed by `(pass, purpose)` so targets are created
//! exactly once, lazily, and handed between stages as explicit values rather
//! than looked up by name from global state.

use std::collections::HashMap;

use crate::render::device::{ClearValue, Device, FrameTargetId, TextureId};
use crate::render::pass::PassKind;
use crate::render::RenderResult;

/// Well-known attachment names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentName {
    /// Lit or presented color
    Color,
    /// World/view-space position (G-buffer)
    Position,
    /// Surface normal (G-buffer)
    Normal,
    /// Albedo + specular (G-buffer)
    Albedo,
    /// Hardware depth
    Depth,
    /// Single-channel ambient occlusion
    Occlusion,
}

/// Texel formats the pipeline requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 16-bit float RGBA
    Rgba16F,
    /// 32-bit float RGBA
    Rgba32F,
    /// 8-bit single channel
    R8,
    /// 32-bit float depth
    Depth32F,
}

/// Attachment requested at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// Attachment name
    pub name: AttachmentName,
    /// Texel format
    pub format: TextureFormat,
}

/// Everything the device needs to create a frame target
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTargetDescriptor {
    /// Debug label
    pub label: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Clear value applied when bound
    pub clear: ClearValue,
    /// Attachments, fixed for the lifetime of the target
    pub attachments: Vec<AttachmentDescriptor>,
}

impl FrameTargetDescriptor {
    /// Descriptor without attachments
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            clear: ClearValue::default(),
            attachments: Vec::new(),
        }
    }

    /// Add an attachment
    pub fn with_attachment(mut self, name: AttachmentName, format: TextureFormat) -> Self {
        self.attachments.push(AttachmentDescriptor { name, format });
        self
    }

    /// Set the clear value
    pub fn with_clear(mut self, clear: ClearValue) -> Self {
        self.clear = clear;
        self
    }
}

/// A created attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    /// Attachment name
    pub name: AttachmentName,
    /// Texel format
    pub format: TextureFormat,
    /// Texture the attachment can be sampled through
    pub texture: TextureId,
}

/// Offscreen render target owned by the pass that created it
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTarget {
    id: FrameTargetId,
    label: String,
    width: u32,
    height: u32,
    clear: ClearValue,
    attachments: Vec<Attachment>,
}

impl FrameTarget {
    /// Assemble a target; called by device implementations
    pub fn new(id: FrameTargetId, descriptor: &FrameTargetDescriptor, attachments: Vec<Attachment>) -> Self {
        Self {
            id,
            label: descriptor.label.clone(),
            width: descriptor.width,
            height: descriptor.height,
            clear: descriptor.clear,
            attachments,
        }
    }

    /// Device handle
    pub fn id(&self) -> FrameTargetId {
        self.id
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Clear value
    pub fn clear(&self) -> ClearValue {
        self.clear
    }

    /// Change the clear value
    pub fn set_clear(&mut self, clear: ClearValue) {
        self.clear = clear;
    }

    /// Record a new size; the device reallocates storage, attachments keep their ids
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Texture of a named attachment
    pub fn attachment(&self, name: AttachmentName) -> Option<TextureId> {
        self.attachments.iter().find(|a| a.name == name).map(|a| a.texture)
    }

    /// All attachments in creation order
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

/// What a cached target is used for inside its pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPurpose {
    /// Shared shadow atlas
    ShadowAtlas,
    /// Scene color feeding the image effect chain
    SceneColor,
    /// First image effect ping-pong target
    EffectPing,
    /// Second image effect ping-pong target
    EffectPong,
    /// Deferred G-buffer
    GBuffer,
    /// Deferred lit color
    LitColor,
    /// Raw ambient occlusion
    Occlusion,
    /// First SSAO accumulation target
    AccumulationA,
    /// Second SSAO accumulation target
    AccumulationB,
}

/// Lazily created targets keyed by `(pass, purpose)`
#[derive(Debug, Default)]
pub struct FrameTargetCache {
    targets: HashMap<(PassKind, TargetPurpose), FrameTarget>,
    created: usize,
}

impl FrameTargetCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the target for `(pass, purpose)`, creating it on first use and
    /// resizing it when the requested size changed
    pub fn ensure(
        &mut self,
        device: &mut dyn Device,
        pass: PassKind,
        purpose: TargetPurpose,
        width: u32,
        height: u32,
        describe: impl FnOnce() -> FrameTargetDescriptor,
    ) -> RenderResult<FrameTarget> {
        let key = (pass, purpose);
        if let Some(target) = self.targets.get_mut(&key) {
            if target.size() != (width, height) {
                log::debug!(
                    "Resizing frame target '{}' {:?} -> {}x{}",
                    target.label(),
                    target.size(),
                    width,
                    height
                );
                device.resize_frame_target(target, width, height)?;
            }
            return Ok(target.clone());
        }

        let mut descriptor = describe();
        descriptor.width = width;
        descriptor.height = height;
        let target = device.create_frame_target(&descriptor)?;
        log::debug!("Created frame target '{}' for {:?}/{:?}", target.label(), pass, purpose);
        self.created += 1;
        self.targets.insert(key, target.clone());
        Ok(target)
    }

    /// Cached target without creating it
    pub fn get(&self, pass: PassKind, purpose: TargetPurpose) -> Option<&FrameTarget> {
        self.targets.get(&(pass, purpose))
    }

    /// Number of targets created over the cache's lifetime
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Number of live targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when nothing has been created yet
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

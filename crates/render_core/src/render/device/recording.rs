//! Recording device
//!
//! A [`Device`] that renders nothing and records every call instead. It backs
//! the test suite and the headless demo: handles are allocated sequentially,
//! binds and unbinds are counted per resource so the binding discipline can
//! be checked after a frame, and chosen programs can be made to fail.

use std::collections::{HashMap, HashSet};

use crate::render::resources::{
    Attachment, FrameTarget, FrameTargetDescriptor, Material, MaterialId, Primitive, PrimitiveId,
};
use crate::render::{RenderError, RenderResult};

use super::{
    BufferId, BufferUsage, ClearValue, Device, FrameTargetId, PixelRect, ProgramId, TextureId,
    UniformValue,
};

/// Resource whose binds are balanced against unbinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// Shader program
    Program(ProgramId),
    /// Texture on a unit
    Texture(TextureId),
    /// Vertex buffer
    VertexBuffer(BufferId),
    /// Index buffer
    IndexBuffer(BufferId),
    /// Material state block
    Material(MaterialId),
    /// Offscreen target
    FrameTarget(FrameTargetId),
}

/// State captured at a draw call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    /// Primitive drawn
    pub primitive: PrimitiveId,
    /// Program current at the draw
    pub program: Option<ProgramId>,
    /// Bound target, `None` for the default target
    pub target: Option<FrameTargetId>,
    /// Viewport at the draw
    pub viewport: Option<PixelRect>,
    /// Scissor at the draw
    pub scissor: Option<PixelRect>,
}

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// Buffer creation
    CreateBuffer { buffer: BufferId, usage: BufferUsage, len: usize },
    /// Frame target creation
    CreateFrameTarget { target: FrameTargetId, label: String },
    /// Frame target resize
    ResizeFrameTarget { target: FrameTargetId, width: u32, height: u32 },
    /// Target bound
    BindFrameTarget(FrameTargetId),
    /// Target released
    UnbindFrameTarget(FrameTargetId),
    /// Viewport change
    SetViewport(PixelRect),
    /// Scissor change
    SetScissor(Option<PixelRect>),
    /// Clear of the bound target
    Clear { target: Option<FrameTargetId>, value: ClearValue },
    /// Program bound
    BindProgram(ProgramId),
    /// Program released
    UnbindProgram(ProgramId),
    /// Texture bound
    BindTexture { unit: u32, texture: TextureId },
    /// Texture released
    UnbindTexture { unit: u32, texture: TextureId },
    /// Vertex buffer bound
    BindVertexBuffer(BufferId),
    /// Vertex buffer released
    UnbindVertexBuffer(BufferId),
    /// Index buffer bound
    BindIndexBuffer(BufferId),
    /// Index buffer released
    UnbindIndexBuffer(BufferId),
    /// Uniform upload
    Uniform { name: String, value: UniformValue },
    /// Material applied
    BindMaterial(MaterialId),
    /// Material state popped
    UnbindMaterial(MaterialId),
    /// Draw call
    Draw(DrawRecord),
}

impl DeviceCall {
    /// True for the release half of a bind pair
    pub fn is_unbind(&self) -> bool {
        matches!(
            self,
            Self::UnbindFrameTarget(_)
                | Self::UnbindProgram(_)
                | Self::UnbindTexture { .. }
                | Self::UnbindVertexBuffer(_)
                | Self::UnbindIndexBuffer(_)
                | Self::UnbindMaterial(_)
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BindCounts {
    binds: usize,
    unbinds: usize,
}

/// Device that records calls instead of rendering
#[derive(Debug)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    counts: HashMap<ResourceKey, BindCounts>,
    failing_programs: HashSet<ProgramId>,
    next_handle: u32,
    frame_targets_created: usize,
    program: Option<ProgramId>,
    targets: Vec<FrameTargetId>,
    viewport: Option<PixelRect>,
    scissor: Option<PixelRect>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Empty recorder
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            counts: HashMap::new(),
            failing_programs: HashSet::new(),
            next_handle: 1000,
            frame_targets_created: 0,
            program: None,
            targets: Vec::new(),
            viewport: None,
            scissor: None,
        }
    }

    /// Make every later bind of `program` fail
    pub fn fail_program(&mut self, program: ProgramId) {
        self.failing_programs.insert(program);
    }

    /// Forget recorded calls; counters and created resources are kept
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Every call in order
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Every draw in order
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Draw(record) => Some(*record),
                _ => None,
            })
            .collect()
    }

    /// Number of draws recorded
    pub fn draw_count(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, DeviceCall::Draw(_))).count()
    }

    /// Draws issued while `target` was bound
    pub fn draws_into(&self, target: Option<FrameTargetId>) -> Vec<DrawRecord> {
        self.draws().into_iter().filter(|draw| draw.target == target).collect()
    }

    /// Last value uploaded for a uniform
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.calls.iter().rev().find_map(|call| match call {
            DeviceCall::Uniform { name: n, value } if n == name => Some(*value),
            _ => None,
        })
    }

    /// Times `key` was bound
    pub fn bind_count(&self, key: ResourceKey) -> usize {
        self.counts.get(&key).map_or(0, |c| c.binds)
    }

    /// Times `key` was released
    pub fn unbind_count(&self, key: ResourceKey) -> usize {
        self.counts.get(&key).map_or(0, |c| c.unbinds)
    }

    /// Resources whose bind and unbind counts differ, with `binds - unbinds`
    pub fn imbalances(&self) -> Vec<(ResourceKey, i64)> {
        self.counts
            .iter()
            .filter(|(_, c)| c.binds != c.unbinds)
            .map(|(key, c)| (*key, c.binds as i64 - c.unbinds as i64))
            .collect()
    }

    /// True when every bind was matched by exactly one unbind
    pub fn is_balanced(&self) -> bool {
        self.counts.values().all(|c| c.binds == c.unbinds)
    }

    /// Number of frame targets created over the device lifetime
    pub fn frame_targets_created(&self) -> usize {
        self.frame_targets_created
    }

    /// Number of clears recorded
    pub fn clear_count(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, DeviceCall::Clear { .. })).count()
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&mut self, call: DeviceCall) {
        log::trace!("RecordingDevice: {:?}", call);
        self.calls.push(call);
    }

    fn bound(&mut self, key: ResourceKey) {
        self.counts.entry(key).or_default().binds += 1;
    }

    fn released(&mut self, key: ResourceKey) {
        let counts = self.counts.entry(key).or_default();
        counts.unbinds += 1;
        if counts.unbinds > counts.binds {
            log::warn!("RecordingDevice: {:?} released more often than bound", key);
        }
    }
}

impl Device for RecordingDevice {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_buffer(&mut self, label: &str, usage: BufferUsage, contents: &[u8]) -> RenderResult<BufferId> {
        let buffer = BufferId(self.handle());
        log::trace!("RecordingDevice: buffer '{}' -> {:?}", label, buffer);
        self.record(DeviceCall::CreateBuffer { buffer, usage, len: contents.len() });
        Ok(buffer)
    }

    fn create_frame_target(&mut self, descriptor: &FrameTargetDescriptor) -> RenderResult<FrameTarget> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(RenderError::Device(format!(
                "frame target '{}' has zero size",
                descriptor.label
            )));
        }
        let id = FrameTargetId(self.handle());
        let attachments = descriptor
            .attachments
            .iter()
            .map(|a| Attachment {
                name: a.name,
                format: a.format,
                texture: TextureId(self.handle()),
            })
            .collect();
        self.frame_targets_created += 1;
        self.record(DeviceCall::CreateFrameTarget { target: id, label: descriptor.label.clone() });
        Ok(FrameTarget::new(id, descriptor, attachments))
    }

    fn resize_frame_target(&mut self, target: &mut FrameTarget, width: u32, height: u32) -> RenderResult<()> {
        target.set_size(width, height);
        self.record(DeviceCall::ResizeFrameTarget { target: target.id(), width, height });
        Ok(())
    }

    fn bind_frame_target(&mut self, target: &FrameTarget) {
        self.bound(ResourceKey::FrameTarget(target.id()));
        self.targets.push(target.id());
        self.record(DeviceCall::BindFrameTarget(target.id()));
    }

    fn unbind_frame_target(&mut self, target: &FrameTarget) {
        self.released(ResourceKey::FrameTarget(target.id()));
        if let Some(pos) = self.targets.iter().rposition(|id| *id == target.id()) {
            self.targets.remove(pos);
        }
        self.record(DeviceCall::UnbindFrameTarget(target.id()));
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.viewport = Some(rect);
        self.record(DeviceCall::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.scissor = rect;
        self.record(DeviceCall::SetScissor(rect));
    }

    fn clear(&mut self, value: &ClearValue) {
        let target = self.targets.last().copied();
        self.record(DeviceCall::Clear { target, value: *value });
    }

    fn bind_program(&mut self, program: ProgramId) -> RenderResult<()> {
        if self.failing_programs.contains(&program) {
            log::warn!("RecordingDevice: refusing to bind {:?}", program);
            return Err(RenderError::Device(format!("program {} failed to bind", program.0)));
        }
        self.bound(ResourceKey::Program(program));
        self.program = Some(program);
        self.record(DeviceCall::BindProgram(program));
        Ok(())
    }

    fn unbind_program(&mut self, program: ProgramId) {
        self.released(ResourceKey::Program(program));
        if self.program == Some(program) {
            self.program = None;
        }
        self.record(DeviceCall::UnbindProgram(program));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.bound(ResourceKey::Texture(texture));
        self.record(DeviceCall::BindTexture { unit, texture });
    }

    fn unbind_texture(&mut self, unit: u32, texture: TextureId) {
        self.released(ResourceKey::Texture(texture));
        self.record(DeviceCall::UnbindTexture { unit, texture });
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId) {
        self.bound(ResourceKey::VertexBuffer(buffer));
        self.record(DeviceCall::BindVertexBuffer(buffer));
    }

    fn unbind_vertex_buffer(&mut self, buffer: BufferId) {
        self.released(ResourceKey::VertexBuffer(buffer));
        self.record(DeviceCall::UnbindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.bound(ResourceKey::IndexBuffer(buffer));
        self.record(DeviceCall::BindIndexBuffer(buffer));
    }

    fn unbind_index_buffer(&mut self, buffer: BufferId) {
        self.released(ResourceKey::IndexBuffer(buffer));
        self.record(DeviceCall::UnbindIndexBuffer(buffer));
    }

    fn bind_uniform(&mut self, name: &str, value: UniformValue) {
        self.record(DeviceCall::Uniform { name: name.to_string(), value });
    }

    fn bind_material(&mut self, material: &Material) {
        self.bound(ResourceKey::Material(material.id()));
        self.record(DeviceCall::BindMaterial(material.id()));
    }

    fn unbind_material(&mut self, material: &Material) {
        self.released(ResourceKey::Material(material.id()));
        self.record(DeviceCall::UnbindMaterial(material.id()));
    }

    fn draw_primitive(&mut self, primitive: &Primitive) {
        if self.program.is_none() {
            log::error!("RecordingDevice: draw of {:?} with no program bound", primitive.id());
        }
        let record = DrawRecord {
            primitive: primitive.id(),
            program: self.program,
            target: self.targets.last().copied(),
            viewport: self.viewport,
            scissor: self.scissor,
        };
        self.record(DeviceCall::Draw(record));
    }
}

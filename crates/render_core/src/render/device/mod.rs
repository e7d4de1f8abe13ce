//! Device boundary
//!
//! The pipeline never issues native graphics calls. Everything goes through
//! the [`Device`] capability trait, which a backend implements on top of its
//! API. The device is stateful and not reentrant; it is driven from the
//! thread that owns the graphics context.
//!
//! ## Binding discipline
//!
//! Every `bind_*` must be matched by exactly one `unbind_*` of the same
//! resource, and `draw_primitive` is only legal after a successful
//! `bind_program`. Passes never call the bind methods directly: they go
//! through [`BindScope`], which records each bind and unwinds them in
//! reverse order when it is dropped, on every exit path.

pub mod recording;
pub mod scope;
pub mod types;

pub use recording::{DeviceCall, DrawRecord, RecordingDevice, ResourceKey};
pub use scope::BindScope;
pub use types::{
    BufferId, BufferUsage, ClearValue, FrameTargetId, PixelRect, ProgramId, TextureId,
    UniformValue,
};

use crate::render::resources::{FrameTarget, FrameTargetDescriptor, Material, Primitive};
use crate::render::RenderResult;

/// Capability interface over the graphics API
pub trait Device {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Create a buffer initialised with `contents`
    fn create_buffer(&mut self, label: &str, usage: BufferUsage, contents: &[u8]) -> RenderResult<BufferId>;

    /// Create an offscreen target with the descriptor's attachments
    fn create_frame_target(&mut self, descriptor: &FrameTargetDescriptor) -> RenderResult<FrameTarget>;

    /// Reallocate a target's attachments at a new size
    fn resize_frame_target(&mut self, target: &mut FrameTarget, width: u32, height: u32) -> RenderResult<()>;

    /// Redirect output to `target`
    fn bind_frame_target(&mut self, target: &FrameTarget);

    /// Restore output to the default (presented) target
    fn unbind_frame_target(&mut self, target: &FrameTarget);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, rect: PixelRect);

    /// Set or disable the scissor rectangle
    fn set_scissor(&mut self, rect: Option<PixelRect>);

    /// Clear the currently bound target
    fn clear(&mut self, value: &ClearValue);

    /// Make `program` current; failure leaves nothing bound
    fn bind_program(&mut self, program: ProgramId) -> RenderResult<()>;

    /// Release `program`
    fn unbind_program(&mut self, program: ProgramId);

    /// Bind `texture` to sampler `unit`
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Release `texture` from sampler `unit`
    fn unbind_texture(&mut self, unit: u32, texture: TextureId);

    /// Bind a vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: BufferId);

    /// Release a vertex buffer
    fn unbind_vertex_buffer(&mut self, buffer: BufferId);

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: BufferId);

    /// Release an index buffer
    fn unbind_index_buffer(&mut self, buffer: BufferId);

    /// Upload a uniform to the current program
    fn bind_uniform(&mut self, name: &str, value: UniformValue);

    /// Apply a material: its textures, scalars, and depth/blend/cull state
    fn bind_material(&mut self, material: &Material);

    /// Undo [`Device::bind_material`], popping the pushed state
    fn unbind_material(&mut self, material: &Material);

    /// Issue the draw for `primitive` with the current bindings
    fn draw_primitive(&mut self, primitive: &Primitive);
}

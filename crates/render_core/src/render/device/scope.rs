//! Scoped device bindings
//!
//! [`BindScope`] wraps the device for the duration of a stage or a single
//! object draw. Every bind made through the scope is pushed onto a stack and
//! released in reverse order when the scope is dropped, so early returns and
//! `?` propagation can never leave a dangling bind.

use std::rc::Rc;

use crate::render::resources::{FrameTarget, Material, Primitive};
use crate::render::{RenderError, RenderResult};

use super::{BufferId, ClearValue, Device, PixelRect, ProgramId, TextureId, UniformValue};

#[derive(Debug)]
enum Binding {
    FrameTarget(FrameTarget),
    Program(ProgramId),
    Texture { unit: u32, texture: TextureId },
    VertexBuffer(BufferId),
    IndexBuffer(BufferId),
    Material(Rc<Material>),
}

/// Bind guard over a [`Device`]
pub struct BindScope<'d> {
    device: &'d mut dyn Device,
    bindings: Vec<Binding>,
    program: Option<ProgramId>,
}

impl<'d> BindScope<'d> {
    /// Open a scope with nothing bound
    pub fn new(device: &'d mut dyn Device) -> Self {
        Self {
            device,
            bindings: Vec::new(),
            program: None,
        }
    }

    /// Open a child scope; its binds are released before the parent's
    pub fn nested(&mut self) -> BindScope<'_> {
        BindScope {
            device: &mut *self.device,
            bindings: Vec::new(),
            program: self.program,
        }
    }

    /// Redirect output to `target` until the scope ends
    pub fn frame_target(&mut self, target: &FrameTarget) {
        self.device.bind_frame_target(target);
        self.bindings.push(Binding::FrameTarget(target.clone()));
    }

    /// Make `program` current until the scope ends
    pub fn program(&mut self, program: ProgramId) -> RenderResult<()> {
        self.device.bind_program(program)?;
        self.bindings.push(Binding::Program(program));
        self.program = Some(program);
        Ok(())
    }

    /// Bind a texture to a sampler unit
    pub fn texture(&mut self, unit: u32, texture: TextureId) {
        self.device.bind_texture(unit, texture);
        self.bindings.push(Binding::Texture { unit, texture });
    }

    /// Bind a vertex buffer
    pub fn vertex_buffer(&mut self, buffer: BufferId) {
        self.device.bind_vertex_buffer(buffer);
        self.bindings.push(Binding::VertexBuffer(buffer));
    }

    /// Bind an index buffer
    pub fn index_buffer(&mut self, buffer: BufferId) {
        self.device.bind_index_buffer(buffer);
        self.bindings.push(Binding::IndexBuffer(buffer));
    }

    /// Apply a material
    pub fn material(&mut self, material: &Rc<Material>) {
        self.device.bind_material(material);
        self.bindings.push(Binding::Material(Rc::clone(material)));
    }

    /// Bind the primitive's vertex buffer and, if indexed, its index buffer
    pub fn primitive_buffers(&mut self, primitive: &Primitive) {
        self.vertex_buffer(primitive.vertex_buffer);
        if let Some(index_buffer) = primitive.index_buffer {
            self.index_buffer(index_buffer);
        }
    }

    /// Upload a uniform (uniforms are program state, nothing to unbind)
    pub fn uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.device.bind_uniform(name, value.into());
    }

    /// Set the viewport
    pub fn viewport(&mut self, rect: PixelRect) {
        self.device.set_viewport(rect);
    }

    /// Set or disable the scissor
    pub fn scissor(&mut self, rect: Option<PixelRect>) {
        self.device.set_scissor(rect);
    }

    /// Clear the bound target
    pub fn clear(&mut self, value: &ClearValue) {
        self.device.clear(value);
    }

    /// Draw with the current bindings
    pub fn draw(&mut self, primitive: &Primitive) -> RenderResult<()> {
        if self.program.is_none() {
            log::error!("Draw of primitive {:?} without a bound program", primitive.id());
            return Err(RenderError::InvariantViolation(format!(
                "draw of primitive {:?} without a bound program",
                primitive.id()
            )));
        }
        self.device.draw_primitive(primitive);
        Ok(())
    }

    /// Program bound in this scope or an enclosing one
    pub fn bound_program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Number of binds this scope will release
    pub fn depth(&self) -> usize {
        self.bindings.len()
    }
}

impl Drop for BindScope<'_> {
    fn drop(&mut self) {
        while let Some(binding) = self.bindings.pop() {
            match binding {
                Binding::FrameTarget(target) => self.device.unbind_frame_target(&target),
                Binding::Program(program) => self.device.unbind_program(program),
                Binding::Texture { unit, texture } => self.device.unbind_texture(unit, texture),
                Binding::VertexBuffer(buffer) => self.device.unbind_vertex_buffer(buffer),
                Binding::IndexBuffer(buffer) => self.device.unbind_index_buffer(buffer),
                Binding::Material(material) => self.device.unbind_material(&material),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{DeviceCall, RecordingDevice, ResourceKey};
    use crate::render::resources::Topology;

    fn quad() -> Primitive {
        Primitive::non_indexed(BufferId(7), 4, Topology::TriangleStrip)
    }

    #[test]
    fn test_scope_unwinds_in_reverse_order() {
        let mut device = RecordingDevice::new();
        let material = Rc::new(Material::new());
        {
            let mut scope = BindScope::new(&mut device);
            scope.program(ProgramId(1)).unwrap();
            scope.material(&material);
            scope.texture(3, TextureId(9));
            scope.primitive_buffers(&quad());
            scope.draw(&quad()).unwrap();
        }
        let unbinds: Vec<_> = device
            .calls()
            .iter()
            .filter(|call| call.is_unbind())
            .cloned()
            .collect();
        assert_eq!(
            unbinds,
            vec![
                DeviceCall::UnbindVertexBuffer(BufferId(7)),
                DeviceCall::UnbindTexture { unit: 3, texture: TextureId(9) },
                DeviceCall::UnbindMaterial(material.id()),
                DeviceCall::UnbindProgram(ProgramId(1)),
            ]
        );
        assert!(device.is_balanced());
    }

    #[test]
    fn test_draw_without_program_is_rejected() {
        let mut device = RecordingDevice::new();
        let mut scope = BindScope::new(&mut device);
        let result = scope.draw(&quad());
        assert!(matches!(result, Err(RenderError::InvariantViolation(_))));
        drop(scope);
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn test_failed_program_bind_leaves_nothing_bound() {
        let mut device = RecordingDevice::new();
        device.fail_program(ProgramId(4));
        {
            let mut scope = BindScope::new(&mut device);
            assert!(scope.program(ProgramId(4)).is_err());
            assert_eq!(scope.depth(), 0);
        }
        assert_eq!(device.unbind_count(ResourceKey::Program(ProgramId(4))), 0);
        assert!(device.is_balanced());
    }

    #[test]
    fn test_early_return_still_unbinds() {
        fn stage(device: &mut dyn Device) -> RenderResult<()> {
            let mut scope = BindScope::new(device);
            scope.texture(0, TextureId(1));
            let mut inner = scope.nested();
            inner.vertex_buffer(BufferId(2));
            // no program bound: draw fails and `?` leaves both scopes
            inner.draw(&quad())?;
            Ok(())
        }

        let mut device = RecordingDevice::new();
        assert!(stage(&mut device).is_err());
        assert!(device.is_balanced());
        assert_eq!(device.bind_count(ResourceKey::Texture(TextureId(1))), 1);
        assert_eq!(device.unbind_count(ResourceKey::Texture(TextureId(1))), 1);
    }
}

//! Full-screen quad shared by the compositing stages

use std::rc::Rc;

use crate::render::device::{BufferUsage, Device};
use crate::render::resources::{Primitive, Topology};
use crate::render::RenderResult;

/// Clip-space position (xy) and texture coordinate (uv) per vertex
const VERTICES: [[f32; 4]; 4] = [
    [-1.0, -1.0, 0.0, 0.0],
    [1.0, -1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
];

/// Lazily uploaded triangle-strip quad covering the viewport
#[derive(Debug, Default)]
pub struct ScreenQuad {
    primitive: Option<Rc<Primitive>>,
}

impl ScreenQuad {
    /// Quad not yet uploaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload on first use and return the primitive
    pub fn ensure(&mut self, device: &mut dyn Device) -> RenderResult<Rc<Primitive>> {
        if let Some(primitive) = &self.primitive {
            return Ok(Rc::clone(primitive));
        }
        let buffer = device.create_buffer("screen_quad", BufferUsage::Vertex, bytemuck::cast_slice(&VERTICES))?;
        let primitive = Rc::new(Primitive::non_indexed(buffer, VERTICES.len() as u32, Topology::TriangleStrip));
        log::debug!("Uploaded screen quad as {:?}", buffer);
        self.primitive = Some(Rc::clone(&primitive));
        Ok(primitive)
    }
}

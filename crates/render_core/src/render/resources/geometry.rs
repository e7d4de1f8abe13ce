//! Drawable primitives and the scene geometry that owns them

use std::sync::atomic::{AtomicU32, Ordering};

use crate::foundation::math::Mat4;
use crate::render::device::BufferId;

/// Unique identifier for primitives, part of the queue batch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u32);

impl PrimitiveId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Independent triangles
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Independent lines
    Lines,
}

/// GPU-resident vertex/index data ready to be drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    id: PrimitiveId,
    /// Vertex buffer
    pub vertex_buffer: BufferId,
    /// Index buffer, `None` for non-indexed draws
    pub index_buffer: Option<BufferId>,
    /// Index count (indexed) or vertex count (non-indexed)
    pub element_count: u32,
    /// Assembly mode
    pub topology: Topology,
}

impl Primitive {
    /// Indexed triangle list
    pub fn indexed(vertex_buffer: BufferId, index_buffer: BufferId, index_count: u32) -> Self {
        Self {
            id: PrimitiveId::next(),
            vertex_buffer,
            index_buffer: Some(index_buffer),
            element_count: index_count,
            topology: Topology::Triangles,
        }
    }

    /// Non-indexed draw of `vertex_count` vertices
    pub fn non_indexed(vertex_buffer: BufferId, vertex_count: u32, topology: Topology) -> Self {
        Self {
            id: PrimitiveId::next(),
            vertex_buffer,
            index_buffer: None,
            element_count: vertex_count,
            topology,
        }
    }

    /// Unique id
    pub fn id(&self) -> PrimitiveId {
        self.id
    }
}

/// Layer a geometry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderLayer {
    /// Regular scene content
    #[default]
    Scene,
    /// Sky dome/box; never drawn into shadow maps
    Skybox,
}

/// Scene-side geometry component
///
/// The queue only keeps a weak reference to it; when the owning node drops
/// the geometry mid-frame the renderable is skipped.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Debug name
    pub name: String,
    /// Layer used by stage filters
    pub layer: RenderLayer,
    /// Skinning palette computed by the animation system for this frame
    pub skin: Option<Vec<Mat4>>,
}

impl Geometry {
    /// Scene-layer geometry without skinning
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Put the geometry on another layer
    pub fn with_layer(mut self, layer: RenderLayer) -> Self {
        self.layer = layer;
        self
    }

    /// Attach a skinning palette
    pub fn with_skin(mut self, joints: Vec<Mat4>) -> Self {
        self.skin = Some(joints);
        self
    }

    /// True for sky geometry
    pub fn is_skybox(&self) -> bool {
        self.layer == RenderLayer::Skybox
    }
}

//! # Render Core
//!
//! Backend-agnostic scene render pipeline.
//!
//! ## Features
//!
//! - **Render queue**: per-frame bucket classification of renderables and lights
//! - **Scene passes**: forward and standard rendering with an image effect chain
//! - **Deferred pass**: G-buffer fill, lighting composite and SSAO
//! - **Shadow atlas**: directional cascades, spot and point shadows packed
//!   into one shared depth target
//! - **Device boundary**: every bind is paired with its unbind through RAII scopes
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use render_core::prelude::*;
//!
//! let geometry = Rc::new(Geometry::new("crate"));
//! let mut queue = RenderQueue::new();
//! queue.push(
//!     Some(Rc::new(Material::new())),
//!     Some(Rc::new(Primitive::indexed(BufferId(1), BufferId(2), 36))),
//!     &geometry,
//!     Mat4::identity(),
//!     false,
//! );
//!
//! let programs = Rc::new(ProgramRegistry::with_builtin_programs());
//! let mut pipeline = RenderPipeline::forward(RendererConfig::default(), programs);
//! let mut device = RecordingDevice::new();
//! let stats = pipeline.render_frame(&mut device, &queue, &Camera::default()).unwrap();
//! assert_eq!(stats.draw_calls, 1);
//! assert!(device.is_balanced());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RendererConfig, ShadowConfig, SsaoConfig},
        foundation::math::{Mat4, Vec3},
        render::{
            BufferId, Camera, Device, FrameStats, Geometry, ImageEffect, Light, Material, PassKind,
            Primitive, ProgramId, ProgramRegistry, RecordingDevice, RecoveryPolicy, RenderError,
            RenderLayer, RenderPass, RenderPipeline, RenderQueue, RenderResult, Stage,
        },
    };
}

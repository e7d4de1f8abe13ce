//! Shadow maps and the shared shadow atlas
//!
//! - **map**: per-light [`ShadowMap`], owned by its light
//! - **atlas**: [`ShadowAtlasPacker`], assigns up to four lights a cell
//! - **projection**: light-space matrices and cascade fitting

pub mod atlas;
pub mod map;
pub mod projection;

pub use atlas::{AtlasAssignment, AtlasLayout, ShadowAtlasPacker, ATLAS_CAPACITY};
pub use map::{ShadowBias, ShadowMap};
pub use projection::{LightMatrices, CASCADE_COUNT, CUBE_FACE_COUNT};

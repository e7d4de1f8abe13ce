//! Program registry
//!
//! Compiled shader programs are looked up by well-known string keys. The
//! registry is filled by the backend at startup; a miss is never a panic, the
//! caller decides whether the program was per-object, optional or mandatory.

use std::collections::HashMap;

use crate::render::device::ProgramId;
use crate::render::{RenderError, RenderResult};

/// Well-known program keys
pub mod keys {
    /// Unlit fallback of the standard pass
    pub const STANDARD: &str = "shaders/render_pass/standard";
    /// Lit fallback of the forward pass
    pub const FORWARD: &str = "shaders/render_pass/forward";
    /// Depth-only program of the occluder stage
    pub const DEPTH: &str = "shaders/render_pass/depth";
    /// Linear depth written into the shadow atlas
    pub const SHADOW_DEPTH: &str = "shaders/render_pass/shadow_depth";
    /// Screen-space overlay program
    pub const SCREEN: &str = "shaders/render_pass/screen";
    /// Deferred G-buffer fill
    pub const GBUFFER: &str = "shaders/render_pass/deferred_gbuffer";
    /// Deferred lighting compose
    pub const COMPOSE: &str = "shaders/render_pass/deferred_compose";
    /// Ambient occlusion from position/normal
    pub const SSAO: &str = "shaders/render_pass/ssao";
    /// Blend of ambient occlusion into lit color
    pub const SSAO_BLEND: &str = "shaders/render_pass/ssao_blend";
    /// Full-screen copy to the presented target
    pub const BLIT: &str = "shaders/render_pass/blit";

    /// Every key above
    pub const BUILTIN: [&str; 10] = [
        STANDARD, FORWARD, DEPTH, SHADOW_DEPTH, SCREEN, GBUFFER, COMPOSE, SSAO, SSAO_BLEND, BLIT,
    ];
}

/// Named program lookup
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    programs: HashMap<String, ProgramId>,
}

impl ProgramRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in key mapped to consecutive ids starting at 1
    pub fn with_builtin_programs() -> Self {
        let mut registry = Self::new();
        for (index, key) in keys::BUILTIN.iter().enumerate() {
            registry.register(*key, ProgramId(index as u32 + 1));
        }
        registry
    }

    /// Register (or replace) a program
    pub fn register(&mut self, key: impl Into<String>, program: ProgramId) {
        let key = key.into();
        if let Some(previous) = self.programs.insert(key.clone(), program) {
            log::debug!("Program '{}' replaced: {:?} -> {:?}", key, previous, program);
        }
    }

    /// Remove a program; returns what was registered
    pub fn unregister(&mut self, key: &str) -> Option<ProgramId> {
        self.programs.remove(key)
    }

    /// Look up a program
    pub fn get(&self, key: &str) -> Option<ProgramId> {
        self.programs.get(key).copied()
    }

    /// True when `key` is registered
    pub fn contains(&self, key: &str) -> bool {
        self.programs.contains_key(key)
    }

    /// Look up a program the pass cannot run without
    pub fn require(&self, key: &str, pass: &'static str) -> RenderResult<ProgramId> {
        self.get(key).ok_or_else(|| {
            log::error!("{} pass cannot run: program '{}' is not registered", pass, key);
            RenderError::Configuration { pass, program: key.to_string() }
        })
    }

    /// Number of registered programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_programs_are_distinct() {
        let registry = ProgramRegistry::with_builtin_programs();
        assert_eq!(registry.len(), keys::BUILTIN.len());
        assert_ne!(registry.get(keys::FORWARD), registry.get(keys::STANDARD));
    }

    #[test]
    fn test_require_reports_configuration_error() {
        let mut registry = ProgramRegistry::with_builtin_programs();
        registry.unregister(keys::COMPOSE);
        let err = registry.require(keys::COMPOSE, "deferred").unwrap_err();
        assert_eq!(
            err,
            RenderError::Configuration { pass: "deferred", program: keys::COMPOSE.to_string() }
        );
    }
}

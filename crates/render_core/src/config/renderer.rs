//! # Renderer Configuration
//!
//! Read-only switches consumed by the passes at render time. Every struct is
//! `#[serde(default)]` so a config file only needs the fields it overrides.

use serde::{Serialize, Deserialize};

use super::{Config, ConfigError};

/// Shadow mapping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Edge length in texels of the square shadow atlas
    pub atlas_size: u32,
    /// Default near plane for directional light projections
    pub directional_near: f32,
    /// Default far plane for directional light projections
    pub directional_far: f32,
    /// Orthographic half-extent used when no camera is available to fit cascades
    pub fallback_half_extent: f32,
    /// Blend between uniform (0) and logarithmic (1) cascade splits
    pub cascade_lambda: f32,
    /// Near plane for spot and point light frustums
    pub local_light_near: f32,
    /// Constant depth bias uploaded with each shadow map
    pub bias_constant: f32,
    /// Slope-scaled depth bias uploaded with each shadow map
    pub bias_slope: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            atlas_size: 2048,
            directional_near: 1.0,
            directional_far: 512.0,
            fallback_half_extent: 50.0,
            cascade_lambda: 0.5,
            local_light_near: 0.1,
            bias_constant: 0.005,
            bias_slope: 1.5,
        }
    }
}

/// Screen-space ambient occlusion parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoConfig {
    /// Run the SSAO chain after the deferred compose
    pub enabled: bool,
    /// Sampling hemisphere radius in view-space units
    pub radius: f32,
    /// Depth comparison bias
    pub bias: f32,
    /// Number of hemisphere samples
    pub kernel_size: u32,
    /// Occlusion strength applied during the blend
    pub strength: f32,
    /// Number of blend passes ping-ponging between the accumulation targets
    pub blend_passes: u32,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 0.5,
            bias: 0.025,
            kernel_size: 16,
            strength: 1.0,
            blend_passes: 2,
        }
    }
}

/// Top-level renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Bind lights for lit buckets; when false everything draws unlit
    pub lighting_enabled: bool,
    /// Run the shadow map stage
    pub shadow_mapping_enabled: bool,
    /// Depth-only pre-pass before filling the G-buffer
    pub depth_prepass: bool,
    /// Shadow mapping parameters
    pub shadow: ShadowConfig,
    /// SSAO parameters
    pub ssao: SsaoConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            lighting_enabled: true,
            shadow_mapping_enabled: true,
            depth_prepass: false,
            shadow: ShadowConfig::default(),
            ssao: SsaoConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Enable or disable lighting
    pub fn with_lighting(mut self, enabled: bool) -> Self {
        self.lighting_enabled = enabled;
        self
    }

    /// Enable or disable shadow mapping
    pub fn with_shadow_mapping(mut self, enabled: bool) -> Self {
        self.shadow_mapping_enabled = enabled;
        self
    }

    /// Enable or disable the deferred depth pre-pass
    pub fn with_depth_prepass(mut self, enabled: bool) -> Self {
        self.depth_prepass = enabled;
        self
    }

    /// Enable or disable SSAO
    pub fn with_ssao(mut self, enabled: bool) -> Self {
        self.ssao.enabled = enabled;
        self
    }

    /// Set the shadow atlas edge length
    pub fn with_atlas_size(mut self, size: u32) -> Self {
        self.shadow.atlas_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shadow.atlas_size < 4 {
            return Err(ConfigError::Invalid {
                field: "shadow.atlas_size",
                reason: format!("{} is too small to hold four cells", self.shadow.atlas_size),
            });
        }
        if self.shadow.directional_near <= 0.0 || self.shadow.directional_far <= self.shadow.directional_near {
            return Err(ConfigError::Invalid {
                field: "shadow.directional_far",
                reason: format!(
                    "expected 0 < near < far, got near={} far={}",
                    self.shadow.directional_near, self.shadow.directional_far
                ),
            });
        }
        if self.shadow.local_light_near <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "shadow.local_light_near",
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.shadow.cascade_lambda) {
            return Err(ConfigError::Invalid {
                field: "shadow.cascade_lambda",
                reason: format!("{} is outside [0, 1]", self.shadow.cascade_lambda),
            });
        }
        if self.shadow.fallback_half_extent <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "shadow.fallback_half_extent",
                reason: "must be positive".to_string(),
            });
        }
        if self.ssao.enabled && self.ssao.blend_passes == 0 {
            return Err(ConfigError::Invalid {
                field: "ssao.blend_passes",
                reason: "at least one blend pass is required when SSAO is enabled".to_string(),
            });
        }
        Ok(())
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_ssao_blend_ping_pongs() {
        let config = RendererConfig::default();
        assert!(config.ssao.enabled);
        assert_eq!(config.ssao.blend_passes, 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = "shadow_mapping_enabled = false\n[shadow]\natlas_size = 1024\n";
        let config = RendererConfig::from_str_as(text, ConfigFormat::Toml).unwrap();
        assert!(!config.shadow_mapping_enabled);
        assert!(config.lighting_enabled);
        assert_eq!(config.shadow.atlas_size, 1024);
        assert_eq!(config.shadow.directional_far, 512.0);
    }

    #[test]
    fn test_ron_roundtrip_preserves_settings() {
        let config = RendererConfig::default().with_ssao(false).with_atlas_size(512);
        let text = config.to_string_as(ConfigFormat::Ron).unwrap();
        let parsed = RendererConfig::from_str_as(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_directional_planes_rejected() {
        let mut config = RendererConfig::default();
        config.shadow.directional_far = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "shadow.directional_far", .. })
        ));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = ConfigFormat::from_path(std::path::Path::new("renderer.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}

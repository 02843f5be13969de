//! Viewer configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gpu::DEFAULT_MAX_RESOURCE_SETS;
use crate::mipmap::FreqScale;
use crate::worker::{default_worker_count, CoordinatorConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Tunables for planning, scheduling and drawing spectrograms.
///
/// Every field has a default, so a config file only lists what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Largest slice edge the planner may select, in texels.
    pub max_texture_size: usize,
    /// Pyramid levels stop halving at this many pixels.
    pub pyramid_floor: u32,
    /// Extra source pixels kept around the visible slice for the filter taps.
    pub margin_px: usize,
    pub freq_scale: FreqScale,
    /// Delay before the Lanczos-3 pass replaces the bilinear preview.
    pub hq_debounce_ms: u64,
    pub max_resource_sets: usize,
    /// Worker threads; `None` uses the available parallelism.
    pub worker_count: Option<usize>,
    /// Ready mipmaps kept per channel before its surface is registered.
    pub max_backlog: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            pyramid_floor: 1024,
            margin_px: 5,
            freq_scale: FreqScale::Linear,
            hq_debounce_ms: 100,
            max_resource_sets: DEFAULT_MAX_RESOURCE_SETS,
            worker_count: None,
            max_backlog: 4,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_texture_size == 0 {
            return Err(ConfigError::Zero {
                field: "max_texture_size",
            });
        }
        if self.pyramid_floor == 0 {
            return Err(ConfigError::Zero {
                field: "pyramid_floor",
            });
        }
        if self.worker_count == Some(0) {
            return Err(ConfigError::Zero {
                field: "worker_count",
            });
        }
        Ok(())
    }

    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            worker_count: self.worker_count.unwrap_or_else(default_worker_count),
            max_backlog: self.max_backlog,
        }
    }

    pub fn hq_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.hq_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = ViewerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config =
            ViewerConfig::from_json_str(r#"{"freq_scale": "mel", "hq_debounce_ms": 250}"#).unwrap();
        assert_eq!(config.freq_scale, FreqScale::Mel);
        assert_eq!(config.hq_debounce_ms, 250);
        assert_eq!(config.margin_px, 5);
    }

    #[test]
    fn test_zero_floor_is_rejected() {
        let err = ViewerConfig::from_json_str(r#"{"pyramid_floor": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "pyramid_floor" }));
    }

    #[test]
    fn test_coordinator_config_uses_worker_count() {
        let config = ViewerConfig {
            worker_count: Some(3),
            max_backlog: 7,
            ..Default::default()
        };
        let coordinator = config.to_coordinator_config();
        assert_eq!(coordinator.worker_count, 3);
        assert_eq!(coordinator.max_backlog, 7);
    }
}

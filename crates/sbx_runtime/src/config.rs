//! Player configuration: a JSON file with per-field defaults, overridable
//! from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use sbx_core::units::Units;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    #[serde(default)]
    pub units: Units,
    /// Frames per second to pace to; 0 runs as fast as possible.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    #[serde(default = "default_max_frames")]
    pub max_frames: u64,
    /// Where to write the final frame as PNG.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub watch: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            units: Units::default(),
            target_fps: default_target_fps(),
            max_frames: default_max_frames(),
            output: None,
            watch: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config validation failed: {0}")]
    Invalid(String),
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.units.validate().map_err(ConfigError::Invalid)?;
        if self.max_frames == 0 {
            return Err(ConfigError::Invalid("maxFrames must be > 0".to_string()));
        }
        if self.target_fps > MAX_TARGET_FPS {
            return Err(ConfigError::Invalid(format!(
                "targetFps {} exceeds {MAX_TARGET_FPS}",
                self.target_fps
            )));
        }
        Ok(())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<PlayerConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PlayerConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

const MAX_TARGET_FPS: u32 = 1000;

const fn default_target_fps() -> u32 {
    60
}

const fn default_max_frames() -> u64 {
    600
}

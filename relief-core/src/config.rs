/// Viewer settings loaded from an optional TOML file
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ReliefError, Result};
use crate::transform::ViewParams;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "RELIEF_CONFIG";
/// File picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "relief.toml";

/// Tuning for the interaction controller
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Degrees of rotation per pixel-converted-to-radians of drag
    pub drag_sensitivity: f32,
    /// Pan distance per pointer move, regardless of delta size
    pub pan_step: f32,
    /// Zoom change per wheel event
    pub wheel_step: f32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            drag_sensitivity: 5.0,
            pan_step: 5.0,
            wheel_step: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Initial view parameters
    pub view: ViewParams,
    pub input: InputSettings,
}

impl ViewerConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| ReliefError::Config {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ReliefError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Config file to use: `$RELIEF_CONFIG` if set, otherwise `relief.toml`
    /// in the working directory if it exists.
    pub fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.is_file().then_some(local)
    }

    /// Load the discovered config file, falling back to defaults when there
    /// is none.
    pub fn load_or_default() -> Result<Self> {
        match Self::discover() {
            Some(path) => Self::load(&path),
            None => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }
}

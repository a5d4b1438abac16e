//! Configuration management.

use crate::error::{DcpmError, Result};
use crate::paths;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`Settings::engine_binary`].
pub const ENGINE_BINARY_ENV: &str = "DCPM_ENGINE_BINARY";

/// Persistent settings for dcpm.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Container engine executable.
    pub engine_binary: String,
    /// Subcommand selecting the engine's compose plugin.
    pub compose_subcommand: String,
    /// Default log filter when neither `DCPM_LOG` nor `RUST_LOG` is set.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_binary: "docker".to_string(),
            compose_subcommand: "compose".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Get the path to the settings file.
    pub fn config_path() -> PathBuf {
        paths::config_file()
    }

    /// Load settings from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::config_path())?;
        settings.apply_env();
        Ok(settings)
    }

    /// Load settings from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| DcpmError::InvalidConfig {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| DcpmError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })
    }

    fn apply_env(&mut self) {
        if let Ok(binary) = std::env::var(ENGINE_BINARY_ENV) {
            if !binary.is_empty() {
                self.engine_binary = binary;
            }
        }
    }
}

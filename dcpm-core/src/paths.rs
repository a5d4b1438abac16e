//! Centralized path configuration for dcpm.

use std::path::PathBuf;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DCPM_CONFIG_DIR";

/// Get the dcpm configuration directory.
///
/// Resolution order:
/// 1. `DCPM_CONFIG_DIR` environment variable
/// 2. the platform configuration directory joined with `dcpm`
/// 3. `~/.dcpm`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(dir) = dirs::config_dir() {
        return dir.join("dcpm");
    }

    dirs::home_dir().map(|h| h.join(".dcpm")).unwrap_or_else(|| PathBuf::from(".dcpm"))
}

/// Get the settings file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

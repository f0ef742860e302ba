//! Watchdog configuration
//!
//! A single flat TOML table. The geometry constants (template base
//! resolution, device input resolution) and the adb addressing scheme
//! are configuration rather than code: a differently configured
//! emulator product changes this file, not the matcher.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WatchError};

/// Watchdog configuration, persisted as a flat key/value TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Window title prefix identifying emulator instances ("LDPlayer-")
    pub window_prefix: String,
    /// Directory holding `terminal/` and `action/` reference images
    pub template_dir: PathBuf,
    /// Path to the adb executable
    pub adb_path: PathBuf,
    /// adb port of instance index 0
    pub adb_base_port: u16,
    /// Port distance between consecutive instance indices
    pub adb_port_stride: u16,
    /// Width templates were authored at
    pub base_width: u32,
    /// Height templates were authored at
    pub base_height: u32,
    /// Emulator native input-space width
    pub device_width: u32,
    /// Emulator native input-space height
    pub device_height: u32,
    /// Minimum correlation score for a match (inclusive)
    pub confidence: f32,
    /// Monitoring cycle interval in milliseconds
    pub interval_ms: u64,
    /// Wall-clock limit for each external adb invocation
    pub command_timeout_ms: u64,
}

fn default_adb_path() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\LDPlayer\LDPlayer9\adb.exe")
    } else {
        PathBuf::from("adb")
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            window_prefix: "LDPlayer-".to_string(),
            template_dir: PathBuf::from("images"),
            adb_path: default_adb_path(),
            adb_base_port: 5555,
            adb_port_stride: 2,
            base_width: 960,
            base_height: 540,
            device_width: 960,
            device_height: 540,
            confidence: 0.8,
            interval_ms: 1000,
            command_timeout_ms: 5000,
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: first run falls back to the
    /// documented defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| WatchError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        toml::from_str(&text).map_err(|e| WatchError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Persist configuration, written on change by the caller
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self).map_err(|e| WatchError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        std::fs::write(path, text).map_err(|e| WatchError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.window_prefix, "LDPlayer-");
        assert_eq!((config.base_width, config.base_height), (960, 540));
        assert_eq!(config.adb_base_port, 5555);
        assert_eq!(config.adb_port_stride, 2);
        assert_eq!(config.confidence, 0.8);
        assert_eq!(config.interval_ms, 1000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = WatchConfig::load("/nonexistent/emuwatch.toml").unwrap();
        assert_eq!(config.window_prefix, "LDPlayer-");
    }

    #[test]
    fn test_roundtrip() {
        let dir = std::env::temp_dir().join(format!("emuwatch-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut config = WatchConfig::default();
        config.confidence = 0.92;
        config.adb_base_port = 16384;
        config.window_prefix = "MuMu-".to_string();
        config.save(&path).unwrap();

        let loaded = WatchConfig::load(&path).unwrap();
        assert_eq!(loaded.confidence, 0.92);
        assert_eq!(loaded.adb_base_port, 16384);
        assert_eq!(loaded.window_prefix, "MuMu-");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join(format!("emuwatch-cfg-partial-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "confidence = 0.7\n").unwrap();

        let loaded = WatchConfig::load(&path).unwrap();
        assert_eq!(loaded.confidence, 0.7);
        assert_eq!(loaded.interval_ms, 1000);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

//! Runtime configuration and its JSON file representation
//!
//! Config files are written atomically (temp file, sync, rename) and a
//! missing file loads as the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::error::ConfigError;

/// Minimum spacing between signal fetches, matching the platform's rate limit.
pub const DEFAULT_SIGNAL_FETCH_INTERVAL_MS: u64 = 10_000;

/// Configuration for a shim session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of numbered script variables
    pub variable_count: usize,

    /// Minimum milliseconds between two signal fetches
    pub signal_fetch_interval_ms: u64,

    /// Milliseconds slept between frames by `Session::run_until_idle`
    pub frame_interval_ms: u64,

    /// Stop `run_until_idle` after this many frames
    pub max_frames: Option<u64>,

    /// Enable debug tracing
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            variable_count: 5000,
            signal_fetch_interval_ms: DEFAULT_SIGNAL_FETCH_INTERVAL_MS,
            frame_interval_ms: 16,
            max_frames: None,
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Signal fetch interval as a [`Duration`].
    pub fn signal_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.signal_fetch_interval_ms)
    }

    /// Frame interval as a [`Duration`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Reject configurations the runtime cannot run with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.variable_count == 0 {
            return Err(ConfigError::Invalid(
                "variable_count must be at least 1".into(),
            ));
        }
        if self.max_frames == Some(0) {
            return Err(ConfigError::Invalid("max_frames must be positive".into()));
        }
        Ok(())
    }
}

/// Write runtime configuration
pub fn write_config(path: &Path, config: &RuntimeConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
    file.write_all(&json)
        .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file: {:?}", temp_path))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

/// Load runtime configuration
pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    if !path.exists() {
        tracing::debug!(path = ?path, "config file absent, using defaults");
        return Ok(RuntimeConfig::default());
    }

    let data = fs::read(path).with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: RuntimeConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/shimkit.json");

        let config = RuntimeConfig {
            variable_count: 20,
            signal_fetch_interval_ms: 2_500,
            frame_interval_ms: 5,
            max_frames: Some(100),
            debug: true,
        };

        write_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = load_config(&temp.path().join("absent.json")).unwrap();
        assert_eq!(loaded, RuntimeConfig::default());
        assert_eq!(loaded.signal_fetch_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.json");
        fs::write(&path, br#"{"variable_count": 12}"#).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.variable_count, 12);
        assert_eq!(loaded.frame_interval_ms, 16);
    }

    #[test]
    fn test_zero_variables_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, br#"{"variable_count": 0}"#).unwrap();

        assert!(load_config(&path).is_err());
    }
}

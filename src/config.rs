//! # Configuration Management Module
//!
//! Persistent settings for the sweep chart pipeline, stored in the
//! platform config directory.
//!
//! ## Settings
//! - `sweep_period_ms`: Width of one chart sweep
//! - `page_size`: Rows requested from the store per poll
//! - `poll_interval_ms`: Delay between chart polls
//! - `trailing_fragment`: How the decoder treats an unterminated last frame
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/ventscope/config.toml
//! - Linux: ~/.config/ventscope/config.toml
//! - Windows: %APPDATA%\ventscope\config.toml

use crate::decoder::TrailingFragment;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sweep_period_ms: u64,
    pub page_size: usize,
    pub poll_interval_ms: u64,
    pub trailing_fragment: TrailingFragment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_period_ms: 30_000,
            page_size: 2_000,
            poll_interval_ms: 1_000,
            trailing_fragment: TrailingFragment::Hold,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ventscope")
            .join("config.toml")
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the chart pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_period_ms == 0 {
            return Err(ConfigError::Invalid("sweep_period_ms must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Load config from the default location, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_path())
    }

    /// Load config from `path`, writing defaults there if the file is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .map_err(ConfigError::ParseFailed)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string)
            .map_err(ConfigError::WriteFailed)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sweep_period(), Duration::from_secs(30));
        assert_eq!(config.page_size, 2_000);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.trailing_fragment, TrailingFragment::Hold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            trailing_fragment: TrailingFragment::EmitSampled,
            ..Config::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("sweep_period_ms = 30000"));
        assert!(toml_str.contains("trailing_fragment = \"emit-sampled\""));
    }

    #[test]
    fn test_config_deserialization_fills_defaults() {
        let toml_str = r#"
            sweep_period_ms = 60000
            trailing_fragment = "emit-sampled"
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.sweep_period_ms, 60_000);
        assert_eq!(config.page_size, 2_000);
        assert_eq!(config.trailing_fragment, TrailingFragment::EmitSampled);
    }

    #[test]
    fn test_config_load_creates_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            sweep_period_ms: 10_000,
            page_size: 500,
            poll_interval_ms: 200,
            trailing_fragment: TrailingFragment::EmitSampled,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unparseable_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "sweep_period_ms = \"soon\"\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }
}

// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Configuration module

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::risk::{Mode, ThresholdSet, DEMO_THRESHOLDS, PRODUCTION_THRESHOLDS};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Run against the simulated predictor instead of a live backend
    pub demo_mode: bool,

    /// Predictor API configuration
    pub api: ApiConfig,

    /// Session configuration
    pub session: SessionConfig,

    /// Per-mode classification thresholds
    pub thresholds: ThresholdConfig,

    /// Incident database configuration
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "SLA-Guard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            demo_mode: false,
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            thresholds: ThresholdConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config at {path:?}"))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        if self.session.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("slaguard"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Predictor API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the risk predictor
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Polling period in seconds
    pub poll_interval_secs: u64,

    /// Prediction horizon in hours
    pub horizon_hours: u32,

    /// Mode new sessions start in
    pub default_mode: Mode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            horizon_hours: 6,
            default_mode: Mode::Production,
        }
    }
}

impl SessionConfig {
    /// Polling period as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Per-mode classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Cutoffs used in production mode
    pub production: ThresholdSet,

    /// Cutoffs used in demo mode
    pub demo: ThresholdSet,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            production: PRODUCTION_THRESHOLDS,
            demo: DEMO_THRESHOLDS,
        }
    }
}

impl ThresholdConfig {
    /// The threshold set active for `mode`
    pub fn for_mode(&self, mode: Mode) -> ThresholdSet {
        match mode {
            Mode::Production => self.production,
            Mode::Demo => self.demo,
        }
    }

    /// Validate both threshold sets
    pub fn validate(&self) -> Result<()> {
        self.production.validate()?;
        self.demo.validate()?;
        Ok(())
    }
}

/// Incident database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Enable incident persistence
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,

    /// Retention period in days
    pub retention_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/slaguard.db"),
            retention_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.session.poll_interval_secs, 30);
        assert_eq!(parsed.thresholds.production.critical, 0.70);
        assert_eq!(parsed.session.default_mode, Mode::Production);
    }

    #[test]
    fn load_rejects_inverted_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.thresholds.production = ThresholdSet {
            warning: 0.9,
            critical: 0.1,
        };
        config.save(&path).unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.session.horizon_hours, 6);
    }
}

//! Analytics configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/tally/config/analytics.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Every section and key is optional; anything missing keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anomaly::AnomalyConfig;
use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::forecast::{ForecastConfig, SeasonalityConfig};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/analytics.toml");

/// All tunable thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub forecast: ForecastConfig,
    pub seasonality: SeasonalityConfig,
    pub anomaly: AnomalyConfig,
    pub cache: CacheConfig,
}

impl AnalyticsConfig {
    /// Load from the data-dir override if present, else embedded defaults
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::embedded(),
        }
    }

    /// Load from an explicit file; a missing file falls back to embedded defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config override not found, using defaults");
            return Self::embedded();
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded analytics config");
        Self::from_toml(&content)
    }

    /// `load_from` when a path is given, `load` otherwise
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.forecast.periods_ahead == 0 {
            return Err(Error::Config("forecast.periods_ahead must be at least 1".into()));
        }
        if self.anomaly.zscore_min_peers == 0 {
            return Err(Error::Config("anomaly.zscore_min_peers must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.anomaly.income_drop_ratio) {
            return Err(Error::Config(
                "anomaly.income_drop_ratio must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

/// Path of the user override file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("analytics.toml"))
}

//! Unified configuration for the aggregation layer.
//!
//! Configuration is loaded with precedence: caller overrides > Env vars >
//! Config file > Defaults
//!
//! # Example config file (worklens.toml)
//! ```toml
//! [aggregator]
//! event_capacity = 512
//! result_capacity = 64
//! deep_scan = true
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default fan-in channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
/// Default result channel capacity
pub const DEFAULT_RESULT_CAPACITY: usize = 32;

/// Main configuration for the aggregation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Aggregator tuning
    pub aggregator: AggregatorTuning,
}

impl LensConfig {
    /// Load configuration with precedence: overrides > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - Caller overrides to apply on top
    pub fn load(config_path: Option<&str>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(LensConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with WORKLENS_ prefix
        figment = figment.merge(Env::prefixed("WORKLENS_").split("__"));

        // Layer 3: Caller overrides
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }

    /// Load from environment and optional config file only (no overrides)
    pub fn from_env(config_path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }
}

/// Aggregator tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorTuning {
    /// Capacity of the fan-in event channel
    pub event_capacity: usize,
    /// Capacity of the result channel toward the consumer
    pub result_capacity: usize,
    /// Run the deep-scan ownership fallback when structured probing fails
    pub deep_scan: bool,
}

impl Default for AggregatorTuning {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            deep_scan: true,
        }
    }
}

/// Caller overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<AggregatorOverrides>,
}

/// Optional per-field aggregator overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_scan: Option<bool>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    /// Human-readable cause
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

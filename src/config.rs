//! Configuration management for the function engine
//!
//! Engine behaviour that changes numeric output (consolidation bucket
//! placement, extrapolation during alignment) is configured here once and
//! threaded explicitly into the evaluator. Nothing reads these flags from
//! global state during a call.
//!
//! Configuration is loaded from a TOML file, with environment variable
//! overrides and sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::consolidation::ConsolidationPolicy;
use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Display consolidation policy
    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    /// Series alignment
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Optional function backends
    #[serde(default)]
    pub functions: FunctionsConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Consolidation configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConsolidationConfig {
    /// Align bucket boundaries to epoch multiples of the bucket width
    #[serde(default)]
    pub nudge_start_time_on_aggregation: bool,

    /// Label consolidated points with the last timestamp of their bucket
    #[serde(default)]
    pub use_buckets_highest_timestamp_on_aggregation: bool,
}

impl ConsolidationConfig {
    /// Policy snapshot handed to consolidation
    pub fn policy(&self) -> ConsolidationPolicy {
        ConsolidationPolicy {
            nudge_start_time: self.nudge_start_time_on_aggregation,
            highest_timestamp: self.use_buckets_highest_timestamp_on_aggregation,
        }
    }
}

/// Alignment configuration
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct AlignmentConfig {
    /// Resample coarse series to the finest step by linear interpolation
    #[serde(default)]
    pub extrapolate_points: bool,
}

/// Per-function configuration files
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FunctionsConfig {
    /// Path to the aliasByRedis config file; the function is not registered
    /// when unset
    #[serde(default)]
    pub alias_by_redis: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_toml(path.as_ref())
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_flag("KUBA_GRAPHITE_NUDGE_START_TIME") {
            self.consolidation.nudge_start_time_on_aggregation = v;
        }
        if let Some(v) = env_flag("KUBA_GRAPHITE_HIGHEST_TIMESTAMP") {
            self.consolidation.use_buckets_highest_timestamp_on_aggregation = v;
        }
        if let Some(v) = env_flag("KUBA_GRAPHITE_EXTRAPOLATE_POINTS") {
            self.alignment.extrapolate_points = v;
        }
        if let Ok(path) = std::env::var("KUBA_GRAPHITE_ALIAS_BY_REDIS_CONFIG") {
            self.functions.alias_by_redis = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.is_empty() {
            return Err(ConfigError::Invalid("log level cannot be empty".to_string()));
        }
        if let Some(path) = &self.functions.alias_by_redis {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "aliasByRedis config path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Read and parse a TOML file into `T`
pub(crate) fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

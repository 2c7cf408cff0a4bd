//! Configuration system for siloq.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiloqConfig {
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Account id used in queue URLs, ARNs and as the sender id.
    pub account_id: String,
    /// Region used in queue ARNs.
    pub region: String,
    /// Base of every queue URL: `{base_url}/{account_id}/{queue_name}`.
    pub base_url: String,
    /// Maximum in-flight messages per queue before receive fails with `OverLimit`.
    pub max_inflight_per_queue: usize,
    /// Seconds a deleted queue's name stays unavailable.
    pub queue_deletion_grace_secs: u64,
    /// Minimum seconds between two purges of the same queue.
    pub purge_cooldown_secs: u64,
    /// Interval of the background sweep that fires due timers.
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            account_id: "000000000000".to_string(),
            region: "us-east-1".to_string(),
            base_url: "http://localhost:9324".to_string(),
            max_inflight_per_queue: 120_000,
            queue_deletion_grace_secs: 60,
            purge_cooldown_secs: 60,
            sweep_interval_secs: 1,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Log format (text or json).
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format.
    Text,
    /// JSON format.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("Unknown log format: {}", other))),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics.
    pub enabled: bool,
    /// Bind address of the metrics server.
    pub bind_address: String,
    /// Metrics port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

impl SiloqConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        let engine = &self.engine;
        if engine.account_id.len() != 12 || !engine.account_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "engine.account_id must be 12 digits, got '{}'",
                engine.account_id
            )));
        }
        if engine.region.is_empty() {
            return Err(Error::Config("engine.region must not be empty".to_string()));
        }
        if engine.base_url.is_empty() || engine.base_url.ends_with('/') {
            return Err(Error::Config(
                "engine.base_url must be non-empty without a trailing '/'".to_string(),
            ));
        }
        if engine.max_inflight_per_queue == 0 {
            return Err(Error::Config(
                "engine.max_inflight_per_queue must be positive".to_string(),
            ));
        }
        if engine.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "engine.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(Error::Config(format!(
                "Unknown log level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

//! Configuration management for ferrostage
//!
//! Configuration is layered: built-in defaults, then an optional YAML, TOML or
//! JSON file, then environment variables prefixed with `FERROSTAGE`. The merged
//! result is validated before it is handed out, so every consumer can rely on
//! the bounds checked here.
//!
//! # Examples
//!
//! ```rust
//! use ferrostage_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ferrostage.yaml")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Concurrency: {}", config.transfer.concurrency);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrostage_types::{ConcurrencyLimit, PollInterval, Priority, RetryPolicy, TransferMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "FERROSTAGE";

/// Main configuration structure for ferrostage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Transfer orchestration settings
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Directory scanning settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Staging and deployment locations
    #[serde(default)]
    pub staging: StagingConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transfer orchestration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum number of concurrently active jobs
    pub concurrency: usize,
    /// Priority passed to the transfer facility
    pub priority: Priority,
    /// Copy or move
    pub mode: TransferMode,
    /// Delay between retries of a stalled transfer, in seconds
    pub retry_interval_secs: u64,
    /// Total time a stalled transfer may be retried, in seconds
    pub retry_timeout_secs: u64,
    /// Sleep between polling cycles, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyLimit::DEFAULT,
            priority: Priority::Normal,
            mode: TransferMode::Copy,
            retry_interval_secs: RetryPolicy::DEFAULT_INTERVAL.as_secs(),
            retry_timeout_secs: RetryPolicy::DEFAULT_TIMEOUT.as_secs(),
            poll_interval_ms: PollInterval::DEFAULT.as_millis() as u64,
        }
    }
}

impl TransferConfig {
    /// Validated concurrency limit
    pub fn concurrency_limit(&self) -> ConfigResult<ConcurrencyLimit> {
        ConcurrencyLimit::new(self.concurrency)
            .map_err(|e| ConfigError::invalid_value("transfer.concurrency", e))
    }

    /// Validated retry policy
    pub fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        RetryPolicy::new(
            Duration::from_secs(self.retry_interval_secs),
            Duration::from_secs(self.retry_timeout_secs),
        )
        .map_err(|e| ConfigError::invalid_value("transfer.retry_timeout_secs", e))
    }

    /// Validated poll interval
    pub fn poll_interval(&self) -> ConfigResult<PollInterval> {
        PollInterval::new(Duration::from_millis(self.poll_interval_ms))
            .map_err(|e| ConfigError::invalid_value("transfer.poll_interval_ms", e))
    }
}

/// Directory scanning settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Regular expressions; matching paths are not inventoried
    pub exclude: Vec<String>,
    /// Follow symbolic links while scanning
    pub follow_links: bool,
}

/// Staging and deployment locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Root of the staging area
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_root: Option<PathBuf>,
    /// Base directory that replaces the original drive roots on deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_target: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Emit JSON formatted log lines
    pub json_format: bool,
    /// Write logs to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transfer.concurrency, 4);
        assert_eq!(config.transfer.priority, Priority::Normal);
        assert_eq!(config.transfer.mode, TransferMode::Copy);
        assert_eq!(config.logging.level, "info");
        assert!(config.scan.exclude.is_empty());
    }

    #[test]
    fn test_transfer_accessors() {
        let transfer = TransferConfig::default();
        assert_eq!(transfer.concurrency_limit().unwrap().get(), 4);
        assert_eq!(
            transfer.retry_policy().unwrap().interval(),
            Duration::from_secs(60)
        );
        assert_eq!(
            transfer.poll_interval().unwrap().get(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_transfer_accessors_reject_invalid_values() {
        let transfer = TransferConfig {
            concurrency: 11,
            retry_interval_secs: 30,
            retry_timeout_secs: 10,
            poll_interval_ms: 0,
            ..TransferConfig::default()
        };
        assert!(transfer.concurrency_limit().is_err());
        assert!(transfer.retry_policy().is_err());
        assert!(transfer.poll_interval().is_err());
    }

    #[test]
    fn test_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, deserialized);
        assert!(!yaml.contains("staging_root"));
    }
}

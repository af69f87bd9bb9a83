//! Layered configuration assembly
//!
//! Layers are applied in the order they were added on top of the built-in
//! defaults. Later layers override earlier ones key by key, so a file only
//! needs to name the settings it changes.

use crate::loader::ConfigFormat;
use crate::{Config, ConfigError, ConfigResult};
use config::{Environment, File};
use regex::Regex;
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone)]
enum Layer {
    Defaults,
    File { path: PathBuf, format: ConfigFormat },
    Environment { prefix: String },
}

/// Builds a [`Config`] from defaults, files and environment variables
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    layers: Vec<Layer>,
    env_separator: String,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.layers.push(Layer::Defaults);
        self
    }

    /// Add a configuration file; a missing file is skipped
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = ConfigFormat::from_path(&path);
        self.layers.push(Layer::File { path, format });
        self
    }

    /// Add environment variables named `<prefix><separator><section><separator><key>`
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.layers.push(Layer::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Merge every layer and validate the result
    pub fn build(self) -> ConfigResult<Config> {
        // Defaults are always the bottom layer so partial files deserialize
        let defaults = serde_yaml::to_value(Config::default())?;
        let mut merged = config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        for layer in self.layers {
            merged = match layer {
                Layer::Defaults => merged,
                Layer::File { path, format } if path.is_file() => {
                    merged.add_source(File::from(path).format(format.file_format()))
                }
                Layer::File { .. } => merged,
                Layer::Environment { prefix } => merged.add_source(
                    Environment::with_prefix(&prefix)
                        .prefix_separator(&self.env_separator)
                        .separator(&self.env_separator)
                        .list_separator(",")
                        .with_list_parse_key("scan.exclude")
                        .try_parsing(true),
                ),
            };
        }

        let config: Config = merged.build()?.try_deserialize()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Build, falling back to the defaults when any layer is invalid
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }

    /// Check every bound a consumer relies on
    pub fn validate(config: &Config) -> ConfigResult<()> {
        config.transfer.concurrency_limit()?;
        config.transfer.retry_policy()?;
        config.transfer.poll_interval()?;

        for pattern in &config.scan.exclude {
            Regex::new(pattern)
                .map_err(|e| ConfigError::invalid_value("scan.exclude", e.to_string()))?;
        }

        if let (Some(root), Some(target)) =
            (&config.staging.staging_root, &config.staging.deploy_target)
        {
            if root == target || target.starts_with(root) {
                return Err(ConfigError::validation(
                    "staging.deploy_target must lie outside staging.staging_root",
                ));
            }
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("expected one of {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

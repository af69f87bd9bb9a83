//! Locating, loading and saving configuration files

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult, ENV_PREFIX};
use std::path::{Path, PathBuf};

/// Base name searched for in the working directory
const CONFIG_STEM: &str = "ferrostage";

/// On-disk configuration format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml`, `.yml` and anything unrecognised
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Format implied by the extension of `path`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub(crate) fn file_format(self) -> config::FileFormat {
        match self {
            Self::Yaml => config::FileFormat::Yaml,
            Self::Toml => config::FileFormat::Toml,
            Self::Json => config::FileFormat::Json,
        }
    }

    /// Render `config` in this format
    pub fn render(self, config: &Config) -> ConfigResult<String> {
        let rendered = match self {
            Self::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
            Self::Toml => toml::to_string_pretty(config).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| ConfigError::Serialization {
            format: self.name(),
            message,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the first config file found in the working directory
    /// and `FERROSTAGE__*` environment overrides
    pub fn load_default() -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();
        if let Some(path) = Self::config_exists() {
            builder = builder.add_source_file(path);
        }
        builder.add_env_prefix(ENV_PREFIX).build()
    }

    /// Load a specific file; unlike [`ConfigBuilder::add_source_file`] a
    /// missing file is an error here
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        ConfigBuilder::new()
            .add_defaults()
            .add_source_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Save configuration to a file, choosing the format from its extension
    pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = ConfigFormat::from_path(path).render(config)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the built-in defaults to `path`
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        Self::save_to_file(&Config::default(), path)
    }

    /// First of `ferrostage.{yaml,yml,toml,json}` (or its hidden variant)
    /// present in the working directory
    pub fn config_exists() -> Option<PathBuf> {
        ["yaml", "yml", "toml", "json"]
            .iter()
            .flat_map(|ext| {
                [
                    PathBuf::from(format!("{CONFIG_STEM}.{ext}")),
                    PathBuf::from(format!(".{CONFIG_STEM}.{ext}")),
                ]
            })
            .find(|path| path.is_file())
    }
}

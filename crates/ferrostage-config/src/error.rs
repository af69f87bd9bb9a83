//! Configuration errors

use ferrostage_types::Error as StageError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded, validated or saved
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist
    #[error("configuration file {} not found", path.display())]
    NotFound {
        /// Requested file
        path: PathBuf,
    },

    /// Reading or writing a configuration file failed
    #[error("cannot access configuration file {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The merged sources could not be turned into a [`crate::Config`]
    #[error("cannot read configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// A single setting is out of range or malformed
    #[error("invalid value for '{key}': {message}")]
    InvalidValue {
        /// Dotted setting name, e.g. `transfer.concurrency`
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// The settings are individually valid but do not fit together
    #[error("invalid configuration: {message}")]
    Validation {
        /// What is wrong
        message: String,
    },

    /// The configuration could not be rendered in the requested format
    #[error("cannot write configuration as {format}: {message}")]
    Serialization {
        /// Target format name
        format: &'static str,
        /// Serializer message
        message: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new invalid value error
    pub fn invalid_value<K: Into<String>, S: Into<String>>(key: K, message: S) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Setting the error refers to, if it is about a single one
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization {
            format: "YAML",
            message: error.to_string(),
        }
    }
}

impl From<ConfigError> for StageError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::NotFound { path } => StageError::FileNotFound { path },
            other => StageError::config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrostage_types::ErrorKind;

    #[test]
    fn test_invalid_value_names_the_key() {
        let error = ConfigError::invalid_value("transfer.concurrency", "must be between 1 and 10");
        assert_eq!(error.key(), Some("transfer.concurrency"));
        assert_eq!(
            error.to_string(),
            "invalid value for 'transfer.concurrency': must be between 1 and 10"
        );
    }

    #[test]
    fn test_conversion_into_stage_error() {
        let missing: StageError = ConfigError::NotFound {
            path: PathBuf::from("ferrostage.yaml"),
        }
        .into();
        assert!(matches!(missing, StageError::FileNotFound { .. }));

        let invalid: StageError = ConfigError::validation("retry timeout too short").into();
        assert_eq!(invalid.kind(), ErrorKind::Config);
    }
}

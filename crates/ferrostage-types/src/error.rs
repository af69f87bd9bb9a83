//! Error types and handling for ferrostage
//!
//! Every library crate reports failures through [`Error`]. Variants are grouped
//! into [`ErrorKind`]s that mirror the stages of a run: access problems found
//! while scanning, planning problems found before scheduling, and submission or
//! transfer problems reported by the transfer facility.

use std::io;
use std::path::{Path, PathBuf};

/// How far an error reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Expected during normal operation
    Low,
    /// Affects a single operation, which may succeed on another attempt
    Medium,
    /// Affects a single operation permanently
    High,
    /// Nothing else in the run can succeed
    Critical,
}

/// Main error type for ferrostage operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Any other I/O failure
    #[error("i/o failure: {message}")]
    Io {
        /// Description including the affected path when known
        message: String,
        /// Whether the underlying [`std::io::ErrorKind`] is transient
        recoverable: bool,
    },

    /// A path that was expected to exist does not
    #[error("{} does not exist", path.display())]
    FileNotFound {
        /// Missing path
        path: PathBuf,
    },

    /// Access to a path was refused
    #[error("access to {} denied", path.display())]
    PermissionDenied {
        /// Refused path
        path: PathBuf,
    },

    /// Settings are missing, malformed or out of range
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// A snapshot violated one of its invariants
    #[error("invalid snapshot: {message}")]
    Snapshot {
        /// Description of the violated invariant
        message: String,
    },

    /// Encoding or decoding persisted data failed
    #[error("cannot encode or decode {message}")]
    Serialization {
        /// Affected file and decoder message
        message: String,
    },

    /// The transfer facility rejected a job synchronously
    #[error("submission rejected: {message}")]
    Submission {
        /// Reason given by the facility
        message: String,
    },

    /// The transfer facility reported a failed transfer
    #[error("transfer failed: {message}")]
    Transfer {
        /// Error text reported by the facility
        message: String,
    },

    /// A destination directory could not be created
    #[error("cannot create directory {}: {message}", path.display())]
    DirectoryCreation {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// The transfer facility cannot be reached at all
    #[error("transfer facility unavailable: {message}")]
    FacilityUnavailable {
        /// Reason the facility is unavailable
        message: String,
    },

    /// The run was stopped on request
    #[error("run cancelled")]
    Cancelled,

    /// Anything that fits no other variant
    #[error("{message}")]
    Other {
        /// Description
        message: String,
    },
}

/// Stage of a run an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Filesystem access
    Io,
    /// Configuration
    Config,
    /// Snapshot invariant violations
    Snapshot,
    /// Persistence encoding
    Serialization,
    /// Preparing operations before scheduling
    Planning,
    /// Submitting or executing a transfer
    Transfer,
    /// Facility-wide unavailability
    Facility,
    /// Cancellation
    Cancelled,
    /// Unclassified
    Other,
}

impl Error {
    /// Stage this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorKind::Io
            }
            Self::Config { .. } => ErrorKind::Config,
            Self::Snapshot { .. } => ErrorKind::Snapshot,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::DirectoryCreation { .. } => ErrorKind::Planning,
            Self::Submission { .. } | Self::Transfer { .. } => ErrorKind::Transfer,
            Self::FacilityUnavailable { .. } => ErrorKind::Facility,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// How far this error reaches
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled => ErrorSeverity::Low,
            Self::Io { .. }
            | Self::Submission { .. }
            | Self::Transfer { .. }
            | Self::Other { .. } => ErrorSeverity::Medium,
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::Config { .. }
            | Self::Snapshot { .. }
            | Self::Serialization { .. }
            | Self::DirectoryCreation { .. } => ErrorSeverity::High,
            Self::FacilityUnavailable { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether repeating the failed step could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { recoverable, .. } => *recoverable,
            Self::Submission { .. } | Self::Transfer { .. } | Self::Other { .. } => true,
            _ => false,
        }
    }

    /// Convert an I/O error that occurred on `path`, keeping the path for
    /// not-found and permission failures
    pub fn io_at(path: impl AsRef<Path>, error: &std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            kind => Self::Io {
                message: format!("{}: {}", path.display(), error),
                recoverable: is_transient(kind),
            },
        }
    }

    /// Create a non-transient I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            recoverable: false,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new snapshot error
    pub fn snapshot<S: Into<String>>(message: S) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new submission error
    pub fn submission<S: Into<String>>(message: S) -> Self {
        Self::Submission {
            message: message.into(),
        }
    }

    /// Create a new transfer error
    pub fn transfer<S: Into<String>>(message: S) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    /// Create a new directory creation error
    pub fn directory_creation<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        Self::DirectoryCreation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new facility unavailable error
    pub fn facility_unavailable<S: Into<String>>(message: S) -> Self {
        Self::FacilityUnavailable {
            message: message.into(),
        }
    }

    /// Create an unclassified error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
            recoverable: is_transient(error.kind()),
        }
    }
}

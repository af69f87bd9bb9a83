//! Result type alias for ferrostage operations

use crate::Error;

/// Result type alias for ferrostage operations
pub type Result<T> = std::result::Result<T, Error>;

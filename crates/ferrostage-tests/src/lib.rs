//! End-to-end tests for ferrostage
//!
//! The integration tests drive the whole pipeline on temporary directories:
//! scan, compare, plan, transfer and aggregate.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
pub mod test_utils;

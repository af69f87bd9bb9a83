//! Core data model and error handling for ferrostage
//!
//! This crate provides the types shared by every ferrostage component:
//!
//! - **Error handling**: a single error enum with kinds and severity levels
//! - **Inventory**: inventory records, snapshots and the attribute flag table
//! - **Changesets**: the Added/Modified/Deleted entries produced by a diff
//! - **Configuration**: validated newtypes for concurrency, retry and polling
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrostage_types::{AttributeFlag, AttributeFlags, InventoryRecord, Snapshot};
//! use chrono::Utc;
//!
//! let record = InventoryRecord::new("/v/f1", 100, Utc::now())
//!     .with_attributes(AttributeFlags::from_flags([AttributeFlag::Archive]));
//! let snapshot = Snapshot::new("/v", vec![record], Vec::new());
//! assert!(snapshot.validate().is_ok());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod attributes;
pub mod changeset;
pub mod config;
pub mod error;
pub mod path;
pub mod result;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use attributes::{AttributeFlag, AttributeFlags};
pub use changeset::{ChangeEntry, ChangeStatus, Changeset, ChangesetMetadata, ChangesetSummary};
pub use config::{ConcurrencyLimit, PollInterval, RetryPolicy};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use snapshot::{FileKind, InventoryRecord, Snapshot};
pub use types::{Priority, TransferMode};

//! Snapshot capture, comparison and persistence for ferrostage
//!
//! This crate covers the first half of a staging run:
//!
//! - **Scanning**: walk a directory tree into inventory records, pruning paths
//!   that match exclusion patterns and collecting unreadable paths
//! - **Comparison**: diff two snapshots into an ordered changeset, using size,
//!   last write time (with a one second tolerance) and attribute flags
//! - **Persistence**: read and write snapshots, changesets and error-path sets
//!   as JSON
//!
//! # Examples
//!
//! ```rust
//! use chrono::Utc;
//! use ferrostage_sync::DiffEngine;
//! use ferrostage_types::{ChangeStatus, InventoryRecord, Snapshot};
//!
//! let t0 = Utc::now();
//! let before = Snapshot::new("/v", vec![InventoryRecord::new("/v/f1", 100, t0)], vec![]);
//! let after = Snapshot::new(
//!     "/v",
//!     vec![
//!         InventoryRecord::new("/v/f1", 200, t0),
//!         InventoryRecord::new("/v/f2", 50, t0),
//!     ],
//!     vec![],
//! );
//!
//! let changeset = DiffEngine::default().compare(&before, &after);
//! assert_eq!(changeset.entries[0].status, ChangeStatus::Modified);
//! assert_eq!(changeset.entries[1].status, ChangeStatus::Added);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod scan;
pub mod store;

pub use diff::{DiffConfig, DiffEngine};
pub use scan::{ScanOutput, Scanner};
pub use store::{
    load_changeset, load_error_paths, load_snapshot, read_json, save_changeset, save_snapshot,
    write_json,
};

//! JSON output structures for the ferrostage CLI

use crate::display::transfer_rate;
use ferrostage_engine::RunSummary;
use ferrostage_types::{ChangesetSummary, Snapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// ferrostage version
    pub version: String,
    /// Subcommand that ran
    pub operation: String,
    /// Timestamp when the output was produced
    pub timestamp: String,
}

impl OperationMetadata {
    /// Create metadata for `operation`
    pub fn new(operation: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            operation: operation.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Overall operation result
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation was successful
    pub success: bool,
    /// Result message
    pub message: String,
}

/// Output of `snapshot`
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Captured root
    pub root: String,
    /// Number of files recorded
    pub files: usize,
    /// Sum of file sizes
    pub total_bytes: u64,
    /// Paths that could not be read
    pub error_paths: usize,
    /// Where the snapshot was written
    pub output: String,
}

impl SnapshotResultJson {
    /// Create the output for a saved snapshot
    pub fn new(snapshot: &Snapshot, output: &Path) -> Self {
        Self {
            metadata: OperationMetadata::new("snapshot"),
            root: snapshot.root.clone(),
            files: snapshot.len(),
            total_bytes: snapshot.total_size(),
            error_paths: snapshot.error_paths.len(),
            output: output.display().to_string(),
        }
    }
}

/// Output of `compare`
#[derive(Debug, Serialize, Deserialize)]
pub struct CompareResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Earlier snapshot file
    pub before: String,
    /// Later snapshot file
    pub after: String,
    /// Per-status counts
    pub changes: ChangesetSummary,
    /// Where the changeset was written
    pub output: String,
}

impl CompareResultJson {
    /// Create the output for a saved changeset
    pub fn new(before: &Path, after: &Path, changes: ChangesetSummary, output: &Path) -> Self {
        Self {
            metadata: OperationMetadata::new("compare"),
            before: before.display().to_string(),
            after: after.display().to_string(),
            changes,
            output: output.display().to_string(),
        }
    }
}

/// Run totals in JSON format
#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatsJson {
    /// Copy or move
    pub mode: String,
    /// Operations that entered the run
    pub total_input: usize,
    /// Successful operations
    pub succeeded: usize,
    /// Failed operations
    pub failed: usize,
    /// Moves whose source could not be removed
    pub partial_failures: usize,
    /// Operations dropped before a job was created
    pub skipped: usize,
    /// Bytes covered by planned operations
    pub planned_bytes: u64,
    /// Bytes that reached their destination
    pub transferred_bytes: u64,
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Transfer rate in MB/s
    pub transfer_rate_mbps: f64,
}

/// Output of `stage` and `deploy`
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Run totals
    pub stats: RunStatsJson,
    /// Overall result
    pub result: OperationResult,
}

impl RunResultJson {
    /// Create the output for a finished or aborted run
    pub fn new(operation: &str, summary: &RunSummary, aborted: Option<&str>) -> Self {
        let duration = Duration::from_millis(summary.duration_ms);
        let success = aborted.is_none() && !summary.has_failures();
        let message = match aborted {
            Some(reason) => format!("Run aborted: {reason}"),
            None if success => format!("{} operations completed", summary.succeeded),
            None => format!(
                "Run completed with {} failures and {} partial failures",
                summary.failed, summary.partial_failures
            ),
        };

        Self {
            metadata: OperationMetadata::new(operation),
            stats: RunStatsJson {
                mode: summary.mode.to_string(),
                total_input: summary.total_input,
                succeeded: summary.succeeded,
                failed: summary.failed,
                partial_failures: summary.partial_failures,
                skipped: summary.skipped,
                planned_bytes: summary.planned_bytes,
                transferred_bytes: summary.transferred_bytes,
                duration_seconds: duration.as_secs_f64(),
                transfer_rate_mbps: transfer_rate(summary.transferred_bytes, duration)
                    / 1024.0
                    / 1024.0,
            },
            result: OperationResult { success, message },
        }
    }
}

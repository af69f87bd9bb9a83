//! Operation descriptors and the per-job state machine

use crate::facility::JobHandle;
use chrono::{DateTime, Utc};
use ferrostage_types::ChangeStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Why an operation was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOrigin {
    /// File added since the earlier snapshot
    Added,
    /// File modified since the earlier snapshot
    Modified,
    /// Staged file returning to its original location
    Restored,
}

impl OperationOrigin {
    /// Origin for a changeset status; deleted files are never transferred
    pub fn from_change(status: ChangeStatus) -> Option<Self> {
        match status {
            ChangeStatus::Added => Some(Self::Added),
            ChangeStatus::Modified => Some(Self::Modified),
            ChangeStatus::Deleted => None,
        }
    }
}

impl fmt::Display for OperationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Restored => write!(f, "restored"),
        }
    }
}

/// Top-level location an operation writes beneath
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationRoot {
    /// Drive or root identifier, e.g. `C` or `v`
    pub id: String,
    /// Directory that must be reachable for the operation to proceed
    pub path: PathBuf,
}

/// A planned single-file transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// File to read
    pub source: PathBuf,
    /// File to write
    pub destination: PathBuf,
    /// Size in bytes at planning time
    pub size: u64,
    /// Why the operation exists
    pub origin: OperationOrigin,
    /// Destination root, used to skip unreachable roots in move mode
    pub root: Option<DestinationRoot>,
}

impl OperationDescriptor {
    /// Create a new operation descriptor
    pub fn new<P1: Into<PathBuf>, P2: Into<PathBuf>>(
        source: P1,
        destination: P2,
        size: u64,
        origin: OperationOrigin,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            size,
            origin,
            root: None,
        }
    }

    /// Set the destination root
    pub fn with_root(mut self, id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.root = Some(DestinationRoot {
            id: id.into(),
            path: path.into(),
        });
        self
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for a free slot
    Queued,
    /// Submitted to the transfer facility
    Active,
    /// Data has reached the destination
    Transferred,
    /// Finished successfully
    Succeeded,
    /// Data transferred but the source could not be removed
    PartiallyFailed(String),
    /// Finished unsuccessfully
    Failed(String),
}

impl JobState {
    /// Check if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PartiallyFailed(_) | Self::Failed(_)
        )
    }

    /// Check if the job occupies a concurrency slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Transferred)
    }
}

/// An operation bound to a transfer facility handle
#[derive(Debug, Clone)]
pub struct Job {
    /// The operation being executed
    pub operation: OperationDescriptor,
    /// Facility handle
    pub handle: JobHandle,
    /// Current state
    pub state: JobState,
    /// Wall-clock submission time
    pub started_at: DateTime<Utc>,
    started: Instant,
    stalled_since: Option<Instant>,
}

impl Job {
    /// Create a queued job for a submitted handle
    pub fn new(operation: OperationDescriptor, handle: JobHandle) -> Self {
        Self {
            operation,
            handle,
            state: JobState::Queued,
            started_at: Utc::now(),
            started: Instant::now(),
            stalled_since: None,
        }
    }

    /// Mark the job as submitted
    pub fn activate(&mut self) {
        self.state = JobState::Active;
        self.started_at = Utc::now();
        self.started = Instant::now();
    }

    /// Mark the data as transferred
    pub fn transferred(&mut self) {
        if self.state == JobState::Active {
            self.state = JobState::Transferred;
        }
    }

    /// Mark the job as finished successfully
    pub fn succeed(&mut self) {
        self.state = JobState::Succeeded;
    }

    /// Mark the job as partially failed
    pub fn partially_fail(&mut self, error: impl Into<String>) {
        self.state = JobState::PartiallyFailed(error.into());
    }

    /// Mark the job as failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed(error.into());
    }

    /// Time since submission
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record a transient failure and return how long the current stall has
    /// lasted; consecutive failures share one stall
    pub fn stall(&mut self) -> Duration {
        self.stalled_since.get_or_insert_with(Instant::now).elapsed()
    }

    /// Record that the transfer is making progress again
    pub fn resume(&mut self) {
        self.stalled_since = None;
    }

    /// Whether the last poll reported a transient failure
    pub fn is_stalled(&self) -> bool {
        self.stalled_since.is_some()
    }
}

//! Interface to the asynchronous transfer facility
//!
//! The orchestrator never copies bytes itself. It submits single-file jobs to
//! a [`TransferFacility`], polls their state and finalizes or releases them.
//! Implementations own transfer reliability: resuming, retrying stalled
//! transfers within the [`RetryPolicy`] and reporting what happened.

use async_trait::async_trait;
use ferrostage_types::{Error, Priority, Result, RetryPolicy};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Handle to a job owned by a transfer facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(Uuid);

impl JobHandle {
    /// Create a new job handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a job as reported by the facility
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    /// Data is still moving
    InProgress,
    /// All data is at the destination; the job awaits completion
    Transferred,
    /// The transfer failed and will not be retried
    Error(String),
    /// The transfer stalled and is being retried
    TransientError(String),
    /// The job is unusable
    Fatal(String),
}

/// Everything a facility needs to start one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// File to read
    pub source: PathBuf,
    /// File to write
    pub destination: PathBuf,
    /// Job priority
    pub priority: Priority,
    /// Retry bounds for stalled transfers
    pub retry: RetryPolicy,
}

impl TransferRequest {
    /// Create a new transfer request with default priority and retry policy
    pub fn new<P1: Into<PathBuf>, P2: Into<PathBuf>>(source: P1, destination: P2) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            priority: Priority::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Job-based asynchronous file transfer service
///
/// A handle returned by [`submit`](Self::submit) stays open until it is either
/// completed or released; every open handle counts against the orchestrator's
/// concurrency limit.
#[async_trait]
pub trait TransferFacility: Send + Sync {
    /// Check that the facility can accept work at all
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    /// Start a transfer; rejection is reported synchronously
    async fn submit(&self, request: &TransferRequest) -> Result<JobHandle>;

    /// Report the current state of a job without blocking on it
    async fn poll(&self, handle: &JobHandle) -> Result<TransferState>;

    /// Finalize a transferred job and close its handle
    async fn complete(&self, handle: &JobHandle) -> Result<()>;

    /// Cancel a job if it is still running and close its handle
    async fn release(&self, handle: &JobHandle) -> Result<()>;

    /// Remove the source of a finished move
    async fn remove_source(&self, source: &Path) -> Result<()> {
        tokio::fs::remove_file(source)
            .await
            .map_err(|e| Error::io_at(source, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_job_handle_creation() {
        let first = JobHandle::new();
        let second = JobHandle::new();
        assert_ne!(first, second);
        assert_eq!(first.to_string(), first.as_uuid().to_string());
    }

    #[test]
    fn test_request_builder() {
        let retry = RetryPolicy::new(Duration::from_secs(5), Duration::from_secs(30)).unwrap();
        let request = TransferRequest::new("/v/a", "/stage/v/a")
            .with_priority(Priority::High)
            .with_retry(retry);

        assert_eq!(request.priority, Priority::High);
        assert_eq!(request.retry.timeout(), Duration::from_secs(30));
    }
}

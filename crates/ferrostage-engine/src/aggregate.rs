//! Result records and run summaries
//!
//! Every operation that enters a run ends as exactly one [`ResultRecord`]:
//! planned operations when their job reaches a terminal state, dropped ones
//! when they are skipped. Records are kept in the order outcomes became known,
//! which for jobs is completion order rather than submission order.

use crate::operation::{Job, JobState, OperationDescriptor, OperationOrigin};
use crate::planner::SkippedOperation;
use crate::progress::{ProgressEvent, ProgressSink};
use chrono::{DateTime, Utc};
use ferrostage_types::TransferMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Final outcome of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Transferred (and for moves, source removed)
    Success,
    /// Not transferred
    Failed,
    /// Transferred, but the source of a move could not be removed
    PartialFailure,
    /// Dropped before a job was created
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::PartialFailure => write!(f, "partial failure"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of a copy operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRecord {
    /// File read
    pub source: PathBuf,
    /// File written
    pub destination: Option<PathBuf>,
    /// Size in bytes
    pub size: u64,
    /// Why the operation was planned
    pub origin: OperationOrigin,
    /// Final outcome
    pub outcome: Outcome,
    /// Error text, if any
    pub error: Option<String>,
    /// Submission time, if a job was created
    pub started_at: Option<DateTime<Utc>>,
    /// Time the outcome became known
    pub finished_at: DateTime<Utc>,
}

/// Outcome of a move operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// File read
    pub source: PathBuf,
    /// File written
    pub destination: Option<PathBuf>,
    /// Size in bytes
    pub size: u64,
    /// Destination root identifier
    pub root_id: Option<String>,
    /// Final outcome
    pub outcome: Outcome,
    /// Error text, if any
    pub error: Option<String>,
    /// Whether the source is gone
    pub source_removed: bool,
    /// Submission time, if a job was created
    pub started_at: Option<DateTime<Utc>>,
    /// Time the outcome became known
    pub finished_at: DateTime<Utc>,
}

/// Outcome of one operation, shaped by the operation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultRecord {
    /// Copy outcome
    Copy(CopyRecord),
    /// Move outcome
    Move(MoveRecord),
}

impl ResultRecord {
    /// Source path
    pub fn source(&self) -> &Path {
        match self {
            Self::Copy(r) => &r.source,
            Self::Move(r) => &r.source,
        }
    }

    /// Destination path, if one was computed
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Copy(r) => r.destination.as_deref(),
            Self::Move(r) => r.destination.as_deref(),
        }
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        match self {
            Self::Copy(r) => r.size,
            Self::Move(r) => r.size,
        }
    }

    /// Final outcome
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Copy(r) => r.outcome,
            Self::Move(r) => r.outcome,
        }
    }

    /// Error text, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Copy(r) => r.error.as_deref(),
            Self::Move(r) => r.error.as_deref(),
        }
    }

    /// Operation kind
    pub fn mode(&self) -> TransferMode {
        match self {
            Self::Copy(_) => TransferMode::Copy,
            Self::Move(_) => TransferMode::Move,
        }
    }

    fn log_line(&self) -> String {
        let destination = self
            .destination()
            .map_or_else(|| "-".to_string(), |d| d.display().to_string());
        match self.error() {
            Some(error) => format!(
                "[{}] {} -> {}: {}",
                self.outcome(),
                self.source().display(),
                destination,
                error
            ),
            None => format!("{} -> {}", self.source().display(), destination),
        }
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Copy or move
    pub mode: TransferMode,
    /// Operations that entered the run, planned or skipped
    pub total_input: usize,
    /// Successful operations
    pub succeeded: usize,
    /// Failed operations, not counting partial failures
    pub failed: usize,
    /// Moves whose source could not be removed
    pub partial_failures: usize,
    /// Operations dropped before a job was created
    pub skipped: usize,
    /// Bytes covered by planned operations
    pub planned_bytes: u64,
    /// Bytes that reached their destination
    pub transferred_bytes: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Every outcome in the order it became known
    pub records: Vec<ResultRecord>,
}

impl RunSummary {
    /// Check that every input operation has exactly one outcome
    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed + self.partial_failures + self.skipped == self.total_input
            && self.records.len() == self.total_input
    }

    /// Failures with partial failures counted as a failure subtype
    pub fn failures_including_partial(&self) -> usize {
        self.failed + self.partial_failures
    }

    /// Check whether anything failed, fully or partially
    pub fn has_failures(&self) -> bool {
        self.failures_including_partial() > 0
    }

    /// Records with the given outcome
    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().filter(move |r| r.outcome() == outcome)
    }

    /// One line per successful operation
    pub fn success_log(&self) -> Vec<String> {
        self.with_outcome(Outcome::Success)
            .map(ResultRecord::log_line)
            .collect()
    }

    /// One line per failed or partially failed operation
    pub fn failure_log(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome(), Outcome::Failed | Outcome::PartialFailure))
            .map(ResultRecord::log_line)
            .collect()
    }
}

/// Collects one record per operation and produces the run summary
#[derive(Debug)]
pub struct ResultAggregator {
    mode: TransferMode,
    total_input: usize,
    planned_bytes: u64,
    records: Vec<ResultRecord>,
    progress: ProgressSink,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ResultAggregator {
    /// Create a new aggregator for a run
    pub fn new(mode: TransferMode, total_input: usize, planned_bytes: u64) -> Self {
        Self {
            mode,
            total_input,
            planned_bytes,
            records: Vec::with_capacity(total_input),
            progress: ProgressSink::disabled(),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Report every record to a progress sink
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Records collected so far
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Record the outcome of an operation
    pub fn record(
        &mut self,
        operation: &OperationDescriptor,
        outcome: Outcome,
        error: Option<String>,
        started_at: Option<DateTime<Utc>>,
    ) {
        let finished_at = Utc::now();
        let record = match self.mode {
            TransferMode::Copy => ResultRecord::Copy(CopyRecord {
                source: operation.source.clone(),
                destination: Some(operation.destination.clone()),
                size: operation.size,
                origin: operation.origin,
                outcome,
                error,
                started_at,
                finished_at,
            }),
            TransferMode::Move => ResultRecord::Move(MoveRecord {
                source: operation.source.clone(),
                destination: Some(operation.destination.clone()),
                size: operation.size,
                root_id: operation.root.as_ref().map(|root| root.id.clone()),
                outcome,
                error,
                source_removed: outcome == Outcome::Success,
                started_at,
                finished_at,
            }),
        };
        self.push(record);
    }

    /// Record a job that reached a terminal state
    pub fn record_job(&mut self, job: &Job) {
        debug_assert!(job.state.is_terminal(), "job {} is still running", job.handle);
        let (outcome, error) = match &job.state {
            JobState::Succeeded => (Outcome::Success, None),
            JobState::PartiallyFailed(e) => (Outcome::PartialFailure, Some(e.clone())),
            JobState::Failed(e) => (Outcome::Failed, Some(e.clone())),
            state => (Outcome::Failed, Some(format!("job ended in state {state:?}"))),
        };
        self.record(&job.operation, outcome, error, Some(job.started_at));
    }

    /// Record an operation dropped during planning
    pub fn record_skipped(&mut self, skipped: &SkippedOperation) {
        let finished_at = Utc::now();
        let error = Some(skipped.reason.clone());
        let record = match self.mode {
            TransferMode::Copy => ResultRecord::Copy(CopyRecord {
                source: skipped.source.clone(),
                destination: skipped.destination.clone(),
                size: skipped.size,
                origin: skipped.origin,
                outcome: Outcome::Skipped,
                error,
                started_at: None,
                finished_at,
            }),
            TransferMode::Move => ResultRecord::Move(MoveRecord {
                source: skipped.source.clone(),
                destination: skipped.destination.clone(),
                size: skipped.size,
                root_id: None,
                outcome: Outcome::Skipped,
                error,
                source_removed: false,
                started_at: None,
                finished_at,
            }),
        };
        self.push(record);
    }

    fn push(&mut self, record: ResultRecord) {
        self.progress.emit(ProgressEvent::OperationFinished {
            source: record.source().to_path_buf(),
            outcome: record.outcome(),
            size: record.size(),
        });
        self.records.push(record);
    }

    /// Count the records and close the run
    pub fn finish(self) -> RunSummary {
        let count = |outcome| self.records.iter().filter(|r| r.outcome() == outcome).count();
        let succeeded = count(Outcome::Success);
        let failed = count(Outcome::Failed);
        let partial_failures = count(Outcome::PartialFailure);
        let skipped = count(Outcome::Skipped);
        let transferred_bytes = self
            .records
            .iter()
            .filter(|r| matches!(r.outcome(), Outcome::Success | Outcome::PartialFailure))
            .map(ResultRecord::size)
            .sum();

        RunSummary {
            mode: self.mode,
            total_input: self.total_input,
            succeeded,
            failed,
            partial_failures,
            skipped,
            planned_bytes: self.planned_bytes,
            transferred_bytes,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            started_at: self.started_at,
            finished_at: Utc::now(),
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::JobHandle;

    fn operation(name: &str, size: u64) -> OperationDescriptor {
        OperationDescriptor::new(
            format!("/stage/v/{name}"),
            format!("/v/{name}"),
            size,
            OperationOrigin::Restored,
        )
        .with_root("v", "/v")
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "is still running")]
    fn test_recording_a_running_job_is_rejected() {
        let mut aggregator = ResultAggregator::new(TransferMode::Copy, 1, 10);
        let mut job = Job::new(operation("busy", 10), JobHandle::new());
        job.activate();
        aggregator.record_job(&job);
    }

    #[test]
    fn test_move_partial_failure_reaches_failure_log_only() {
        let mut aggregator = ResultAggregator::new(TransferMode::Move, 2, 30);

        let mut ok = Job::new(operation("ok", 10), JobHandle::new());
        ok.activate();
        ok.succeed();
        aggregator.record_job(&ok);

        let mut partial = Job::new(operation("locked", 20), JobHandle::new());
        partial.activate();
        partial.partially_fail("source in use");
        aggregator.record_job(&partial);

        let summary = aggregator.finish();
        assert!(summary.is_consistent());
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.partial_failures, 1);
        assert_eq!(summary.failures_including_partial(), 1);
        assert_eq!(summary.transferred_bytes, 30);

        assert_eq!(summary.success_log(), vec!["/stage/v/ok -> /v/ok".to_string()]);
        assert_eq!(
            summary.failure_log(),
            vec!["[partial failure] /stage/v/locked -> /v/locked: source in use".to_string()]
        );

        match &summary.records[1] {
            ResultRecord::Move(record) => {
                assert_eq!(record.root_id.as_deref(), Some("v"));
                assert!(!record.source_removed);
            }
            ResultRecord::Copy(_) => panic!("expected a move record"),
        }
    }

    #[test]
    fn test_skipped_operations_are_counted() {
        let mut aggregator = ResultAggregator::new(TransferMode::Copy, 2, 10);
        aggregator.record_skipped(&SkippedOperation {
            source: PathBuf::from("/v/gone"),
            destination: None,
            size: 5,
            origin: OperationOrigin::Added,
            reason: "source unavailable".to_string(),
        });
        aggregator.record(&operation("a", 10), Outcome::Failed, Some("denied".into()), None);

        let summary = aggregator.finish();
        assert!(summary.is_consistent());
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.transferred_bytes, 0);
        assert!(summary.success_log().is_empty());
        assert_eq!(summary.failure_log().len(), 1);
    }

    #[test]
    fn test_records_serialize_with_kind_tag() {
        let mut aggregator = ResultAggregator::new(TransferMode::Copy, 1, 1);
        aggregator.record(&operation("a", 1), Outcome::Success, None, Some(Utc::now()));
        let summary = aggregator.finish();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["mode"], "copy");
        assert_eq!(json["records"][0]["kind"], "copy");
        assert_eq!(json["records"][0]["outcome"], "success");

        let decoded: RunSummary = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, summary);
    }

    #[tokio::test]
    async fn test_records_are_reported_as_progress() {
        let (sink, mut receiver) = ProgressSink::channel();
        let mut aggregator = ResultAggregator::new(TransferMode::Copy, 1, 4).with_progress(sink);
        aggregator.record(&operation("a", 4), Outcome::Success, None, None);

        assert_eq!(
            receiver.recv().await,
            Some(ProgressEvent::OperationFinished {
                source: PathBuf::from("/stage/v/a"),
                outcome: Outcome::Success,
                size: 4,
            })
        );
    }
}

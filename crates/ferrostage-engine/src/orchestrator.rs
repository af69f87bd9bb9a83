//! Bounded-concurrency transfer orchestration
//!
//! A single control loop keeps up to `concurrency` jobs open against the
//! transfer facility. Each cycle it tops up free slots from the FIFO queue,
//! sleeps for the poll interval and then polls every open job in one batch.
//! Job state and the aggregator are owned by the loop, so nothing is shared
//! between tasks and no locking is needed.

use crate::aggregate::{Outcome, ResultAggregator, RunSummary};
use crate::facility::{TransferFacility, TransferRequest, TransferState};
use crate::operation::{Job, OperationDescriptor};
use crate::planner::Plan;
use crate::progress::{ProgressEvent, ProgressSink};
use chrono::Utc;
use ferrostage_config::TransferConfig;
use ferrostage_types::{
    ConcurrencyLimit, Error, PollInterval, Priority, Result, RetryPolicy, TransferMode,
};
use futures::future::join_all;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrchestratorConfig {
    /// Maximum number of open jobs
    pub concurrency: ConcurrencyLimit,
    /// Priority passed to the facility
    pub priority: Priority,
    /// Retry bounds passed to the facility
    pub retry: RetryPolicy,
    /// Delay between polling cycles
    pub poll_interval: PollInterval,
    /// Copy or move
    pub mode: TransferMode,
}

impl OrchestratorConfig {
    /// Create a new configuration with default values for `mode`
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Build a configuration from the `transfer` config section
    pub fn from_config(config: &TransferConfig) -> Result<Self> {
        Ok(Self {
            concurrency: config.concurrency_limit()?,
            priority: config.priority,
            retry: config.retry_policy()?,
            poll_interval: config.poll_interval()?,
            mode: config.mode,
        })
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: ConcurrencyLimit) -> Self {
        self.concurrency = concurrency;
        self
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

    /// Set the poll interval
    pub fn with_poll_interval(mut self, poll_interval: PollInterval) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the transfer mode
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A run that stopped before every operation could be attempted
///
/// The summary is still complete: operations that were never attempted are
/// recorded as skipped and jobs that were cut short as failed.
#[derive(Debug, thiserror::Error)]
#[error("run aborted: {reason}")]
pub struct AbortedRun {
    /// Why the run stopped
    pub reason: Error,
    /// Outcomes up to the abort
    pub summary: Box<RunSummary>,
}

impl AbortedRun {
    fn new(reason: Error, summary: RunSummary) -> Self {
        Self {
            reason,
            summary: Box::new(summary),
        }
    }
}

/// Drives planned operations through a transfer facility
pub struct TransferOrchestrator {
    facility: Arc<dyn TransferFacility>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
    abort: CancellationToken,
    progress: ProgressSink,
}

impl std::fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("aborted", &self.abort.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TransferOrchestrator {
    /// Create a new orchestrator
    pub fn new(facility: Arc<dyn TransferFacility>, config: OrchestratorConfig) -> Self {
        Self {
            facility,
            config,
            cancel: CancellationToken::new(),
            abort: CancellationToken::new(),
            progress: ProgressSink::disabled(),
        }
    }

    /// Use an external token to stop new submissions and drain open jobs
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Use an external token to release every open job immediately
    pub fn with_abort(mut self, token: CancellationToken) -> Self {
        self.abort = token;
        self
    }

    /// Report progress to a sink
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Token that drains the run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token that aborts the run
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Get the configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute a plan to completion
    ///
    /// Per-operation problems never stop the run. Only an unavailable
    /// facility, a destination directory that cannot be created in copy mode
    /// and the abort token end it early.
    pub async fn run(&self, plan: Plan) -> std::result::Result<RunSummary, AbortedRun> {
        let mode = self.config.mode;
        let mut aggregator = ResultAggregator::new(mode, plan.total_input(), plan.total_bytes)
            .with_progress(self.progress.clone());
        for skipped in &plan.skipped {
            aggregator.record_skipped(skipped);
        }

        if let Err(e) = self.facility.probe().await {
            error!("Cannot start run: {}", e);
            skip_all(&mut aggregator, plan.operations, "not attempted: facility unavailable");
            return Err(AbortedRun::new(e, aggregator.finish()));
        }

        let mut operations = plan.operations;
        if mode == TransferMode::Move {
            operations = filter_reachable_roots(operations, &mut aggregator).await;
        }
        let operations = match self.prepare_directories(operations, &mut aggregator).await {
            Ok(operations) => operations,
            Err(e) => return Err(AbortedRun::new(e, aggregator.finish())),
        };

        let mut queue: VecDeque<OperationDescriptor> = operations.into();
        let mut active: Vec<Job> = Vec::with_capacity(self.config.concurrency.get());

        let bytes = queue.iter().map(|op| op.size).sum();
        self.progress.emit(ProgressEvent::RunStarted {
            operations: queue.len(),
            bytes,
        });
        info!(
            "Starting {} run: {} operations, {} bytes, concurrency {}",
            mode,
            queue.len(),
            bytes,
            self.config.concurrency.get()
        );

        loop {
            if self.abort.is_cancelled() {
                warn!("Run aborted with {} open jobs", active.len());
                for mut job in active.drain(..) {
                    job.fail("run aborted");
                    self.release(&job).await;
                    aggregator.record_job(&job);
                }
                skip_all(&mut aggregator, queue, "not attempted: run aborted");
                return Err(AbortedRun::new(Error::Cancelled, aggregator.finish()));
            }

            if !self.cancel.is_cancelled() {
                while active.len() < self.config.concurrency.get() {
                    let Some(operation) = queue.pop_front() else {
                        break;
                    };
                    if let Some(job) = self.submit(operation, &mut aggregator).await {
                        active.push(job);
                    }
                }
            }

            if active.is_empty() && (queue.is_empty() || self.cancel.is_cancelled()) {
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval.get()) => {}
                () = self.abort.cancelled() => continue,
            }

            self.poll_active(&mut active, &mut aggregator).await;
        }

        if !queue.is_empty() {
            info!("Run cancelled, {} operations not attempted", queue.len());
            skip_all(&mut aggregator, queue, "not attempted: run cancelled");
        }

        let summary = aggregator.finish();
        info!(
            "Run finished: {} succeeded, {} failed, {} partially failed, {} skipped in {} ms",
            summary.succeeded,
            summary.failed,
            summary.partial_failures,
            summary.skipped,
            summary.duration_ms
        );
        Ok(summary)
    }

    async fn prepare_directories(
        &self,
        operations: Vec<OperationDescriptor>,
        aggregator: &mut ResultAggregator,
    ) -> Result<Vec<OperationDescriptor>> {
        let mut seen = HashSet::new();
        let parents: Vec<PathBuf> = operations
            .iter()
            .filter_map(|op| op.destination.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
            .filter(|parent| seen.insert(parent.to_path_buf()))
            .map(Path::to_path_buf)
            .collect();

        let mut failed: HashMap<PathBuf, String> = HashMap::new();
        for parent in parents {
            let Err(e) = fs::create_dir_all(&parent).await else {
                continue;
            };
            match self.config.mode {
                TransferMode::Copy => {
                    error!("Cannot create destination directory {}: {}", parent.display(), e);
                    skip_all(aggregator, operations, "not attempted: destination directory failed");
                    return Err(Error::directory_creation(parent, e.to_string()));
                }
                TransferMode::Move => {
                    warn!("Cannot create destination directory {}: {}", parent.display(), e);
                    failed.insert(parent, e.to_string());
                }
            }
        }

        if failed.is_empty() {
            return Ok(operations);
        }

        let mut ready = Vec::with_capacity(operations.len());
        for operation in operations {
            let reason = operation
                .destination
                .parent()
                .and_then(|parent| failed.get(parent));
            match reason {
                Some(reason) => {
                    let reason = format!("destination directory unavailable: {reason}");
                    aggregator.record(&operation, Outcome::Skipped, Some(reason), None);
                }
                None => ready.push(operation),
            }
        }
        Ok(ready)
    }

    async fn submit(
        &self,
        operation: OperationDescriptor,
        aggregator: &mut ResultAggregator,
    ) -> Option<Job> {
        if self.config.mode == TransferMode::Copy {
            match fs::remove_file(&operation.destination).await {
                Ok(()) => debug!("Replacing {}", operation.destination.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Cannot replace {}: {}", operation.destination.display(), e);
                    let error = format!("cannot replace existing destination: {e}");
                    aggregator.record(&operation, Outcome::Failed, Some(error), None);
                    return None;
                }
            }
        }

        let request = TransferRequest::new(&operation.source, &operation.destination)
            .with_priority(self.config.priority)
            .with_retry(self.config.retry);

        match self.facility.submit(&request).await {
            Ok(handle) => {
                debug!("Job {} started for {}", handle, operation.source.display());
                self.progress.emit(ProgressEvent::JobSubmitted {
                    source: operation.source.clone(),
                });
                let mut job = Job::new(operation, handle);
                job.activate();
                Some(job)
            }
            Err(e) => {
                warn!("Submission of {} rejected: {}", operation.source.display(), e);
                aggregator.record(&operation, Outcome::Failed, Some(e.to_string()), Some(Utc::now()));
                None
            }
        }
    }

    async fn poll_active(&self, active: &mut Vec<Job>, aggregator: &mut ResultAggregator) {
        let states = join_all(active.iter().map(|job| self.facility.poll(&job.handle))).await;

        let mut still_active = Vec::with_capacity(active.len());
        for (mut job, state) in active.drain(..).zip(states) {
            match state {
                Ok(TransferState::InProgress) => job.resume(),
                Ok(TransferState::TransientError(message)) => {
                    if job.stall() > self.config.retry.timeout() {
                        warn!(
                            "Job {} exceeded its retry timeout: {}",
                            job.handle, message
                        );
                        job.fail(format!("retry timeout exceeded: {message}"));
                        self.release(&job).await;
                    } else {
                        debug!("Job {} is retrying: {}", job.handle, message);
                    }
                }
                Ok(TransferState::Transferred) => {
                    job.transferred();
                    self.finish_transfer(&mut job).await;
                }
                Ok(TransferState::Error(message) | TransferState::Fatal(message)) => {
                    warn!(
                        "Transfer of {} failed: {}",
                        job.operation.source.display(),
                        message
                    );
                    job.fail(message);
                    self.release(&job).await;
                }
                Err(e) => {
                    warn!("Cannot poll job {}: {}", job.handle, e);
                    job.fail(e.to_string());
                    self.release(&job).await;
                }
            }

            if job.state.is_terminal() {
                aggregator.record_job(&job);
            } else {
                debug_assert!(job.state.is_active(), "job {} lost its slot", job.handle);
                still_active.push(job);
            }
        }
        *active = still_active;
    }

    async fn finish_transfer(&self, job: &mut Job) {
        if let Err(e) = self.facility.complete(&job.handle).await {
            warn!("Cannot complete job {}: {}", job.handle, e);
            job.fail(e.to_string());
            self.release(job).await;
            return;
        }

        match self.config.mode {
            TransferMode::Copy => job.succeed(),
            TransferMode::Move => match self.facility.remove_source(&job.operation.source).await {
                Ok(()) => job.succeed(),
                Err(e) => {
                    warn!(
                        "Moved {} but could not remove the source: {}",
                        job.operation.source.display(),
                        e
                    );
                    job.partially_fail(format!("source not removed: {e}"));
                }
            },
        }
        debug!(
            "Job {} finished in {:?}: {:?}",
            job.handle,
            job.elapsed(),
            job.state
        );
    }

    async fn release(&self, job: &Job) {
        if let Err(e) = self.facility.release(&job.handle).await {
            warn!("Cannot release job {}: {}", job.handle, e);
        }
    }
}

fn skip_all(
    aggregator: &mut ResultAggregator,
    operations: impl IntoIterator<Item = OperationDescriptor>,
    reason: &str,
) {
    for operation in operations {
        aggregator.record(&operation, Outcome::Skipped, Some(reason.to_string()), None);
    }
}

/// Drop every operation whose destination root is not a reachable directory
async fn filter_reachable_roots(
    operations: Vec<OperationDescriptor>,
    aggregator: &mut ResultAggregator,
) -> Vec<OperationDescriptor> {
    let mut reachable: HashMap<PathBuf, bool> = HashMap::new();
    let mut skipped: HashMap<String, usize> = HashMap::new();
    let mut ready = Vec::with_capacity(operations.len());

    for operation in operations {
        let Some(root) = &operation.root else {
            ready.push(operation);
            continue;
        };

        let ok = match reachable.get(&root.path) {
            Some(ok) => *ok,
            None => {
                let ok = fs::metadata(&root.path).await.is_ok_and(|m| m.is_dir());
                reachable.insert(root.path.clone(), ok);
                ok
            }
        };

        if ok {
            ready.push(operation);
        } else {
            *skipped.entry(root.id.clone()).or_default() += 1;
            let reason = format!("destination root {} inaccessible", root.id);
            aggregator.record(&operation, Outcome::Skipped, Some(reason), None);
        }
    }

    let mut skipped: Vec<_> = skipped.into_iter().collect();
    skipped.sort();
    for (id, count) in skipped {
        warn!("Destination root {} is inaccessible, skipping {} operations", id, count);
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationOrigin;
    use crate::testing::{Script, ScriptedFacility};
    use ferrostage_types::ErrorKind;
    use rstest::rstest;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast(mode: TransferMode, concurrency: usize) -> OrchestratorConfig {
        OrchestratorConfig::new(mode)
            .with_concurrency(ConcurrencyLimit::new(concurrency).unwrap())
            .with_poll_interval(PollInterval::new(Duration::from_millis(1)).unwrap())
    }

    fn operations(root: &Path, count: usize) -> Vec<OperationDescriptor> {
        (0..count)
            .map(|i| {
                OperationDescriptor::new(
                    format!("/v/f{i}"),
                    root.join(format!("v/f{i}")),
                    10,
                    OperationOrigin::Added,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(ScriptedFacility::new());
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 2));

        let summary = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 5)))
            .await
            .unwrap();

        assert!(facility.max_open() <= 2);
        assert_eq!(facility.open(), 0);
        assert_eq!(summary.succeeded, 5);
        assert!(summary.is_consistent());
        assert_eq!(
            facility.submitted(),
            (0..5).map(|i| PathBuf::from(format!("/v/f{i}"))).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_slow_jobs_complete_out_of_order() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(
            ScriptedFacility::new().with_script("/v/f0", Script::SucceedAfter(5)),
        );
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 3));

        let summary = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 3)))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 3);
        assert!(facility.max_open() <= 3);
        assert_eq!(summary.records[2].source(), Path::new("/v/f0"));
    }

    #[tokio::test]
    async fn test_move_partial_failure() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(
            ScriptedFacility::new().with_script("/v/f1", Script::FailRemoveSource("in use".into())),
        );
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Move, 4));

        let summary = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 2)))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.partial_failures, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(facility.removed_sources(), vec![PathBuf::from("/v/f0")]);

        let failures = summary.failure_log();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("/v/f1"));
        assert!(summary.success_log().iter().all(|line| !line.contains("/v/f1")));
    }

    #[rstest]
    #[case::rejected(Script::RejectSubmit("read-only".into()), 0)]
    #[case::error(Script::FailTransfer("disk full".into()), 1)]
    #[case::fatal(Script::Fatal("corrupt".into()), 1)]
    #[case::complete(Script::FailComplete("rename failed".into()), 1)]
    #[tokio::test]
    async fn test_failures_are_recorded(#[case] script: Script, #[case] released: usize) {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(ScriptedFacility::new().with_script("/v/f0", script));
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 2));

        let summary = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 3)))
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 2);
        assert!(summary.is_consistent());
        assert_eq!(facility.released().len(), released);
        assert_eq!(facility.open(), 0);
    }

    #[tokio::test]
    async fn test_transient_errors_time_out() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(
            ScriptedFacility::new().with_script("/v/f0", Script::StayTransient("offline".into())),
        );
        let retry = RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(30)).unwrap();
        let orchestrator = TransferOrchestrator::new(
            facility.clone(),
            fast(TransferMode::Copy, 1).with_retry(retry),
        );

        let summary = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 1)))
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.records[0]
            .error()
            .unwrap()
            .starts_with("retry timeout exceeded"));
        assert_eq!(facility.released().len(), 1);
    }

    #[tokio::test]
    async fn test_long_transfer_survives_a_short_stall() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(ScriptedFacility::new().with_script(
            "/v/f0",
            Script::StallOnceAfter(80, "network blip".into()),
        ));
        let retry = RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(30)).unwrap();
        let orchestrator = TransferOrchestrator::new(
            facility.clone(),
            fast(TransferMode::Copy, 1).with_retry(retry),
        );

        let summary = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 1)))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
        assert!(summary.records[0].error().is_none());
        assert_eq!(facility.completed().len(), 1);
        assert!(facility.released().is_empty());
    }

    #[tokio::test]
    async fn test_inaccessible_roots_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let live_root = temp_dir.path().join("live");
        std::fs::create_dir_all(&live_root).unwrap();
        let dead_root = temp_dir.path().join("dead");

        let mut ops = Vec::new();
        for i in 0..10 {
            let root = if i % 3 == 0 && i > 0 { &dead_root } else { &live_root };
            ops.push(
                OperationDescriptor::new(
                    format!("/stage/f{i}"),
                    root.join(format!("f{i}")),
                    1,
                    OperationOrigin::Restored,
                )
                .with_root(if root == &dead_root { "D" } else { "L" }, root),
            );
        }

        let facility = Arc::new(ScriptedFacility::new());
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Move, 4));
        let summary = orchestrator.run(Plan::from_operations(ops)).await.unwrap();

        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.succeeded, 7);
        assert_eq!(facility.submitted().len(), 7);
        assert!(!dead_root.exists());
        assert!(summary.is_consistent());
    }

    #[tokio::test]
    async fn test_copy_directory_failure_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("v");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let facility = Arc::new(ScriptedFacility::new());
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 2));
        let aborted = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 3)))
            .await
            .unwrap_err();

        assert_eq!(aborted.reason.kind(), ErrorKind::Planning);
        assert_eq!(aborted.summary.skipped, 3);
        assert!(aborted.summary.is_consistent());
        assert!(facility.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_move_directory_failure_skips_affected_operations() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("blocked"), b"file").unwrap();

        let ops = vec![
            OperationDescriptor::new(
                "/stage/a",
                temp_dir.path().join("blocked/a"),
                1,
                OperationOrigin::Restored,
            ),
            OperationDescriptor::new(
                "/stage/b",
                temp_dir.path().join("open/b"),
                1,
                OperationOrigin::Restored,
            ),
        ];

        let facility = Arc::new(ScriptedFacility::new());
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Move, 2));
        let summary = orchestrator.run(Plan::from_operations(ops)).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(facility.submitted(), vec![PathBuf::from("/stage/b")]);
    }

    #[tokio::test]
    async fn test_unavailable_facility_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(ScriptedFacility::new().unavailable());
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 2));

        let aborted = orchestrator
            .run(Plan::from_operations(operations(temp_dir.path(), 2)))
            .await
            .unwrap_err();

        assert!(matches!(aborted.reason, Error::FacilityUnavailable { .. }));
        assert_eq!(aborted.summary.skipped, 2);
        assert!(aborted.summary.is_consistent());
    }

    #[tokio::test]
    async fn test_cancellation_drains() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(ScriptedFacility::new().with_default(Script::SucceedAfter(3)));
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 2));
        let token = orchestrator.cancellation_token();

        let (summary, ()) = tokio::join!(
            orchestrator.run(Plan::from_operations(operations(temp_dir.path(), 6))),
            async {
                while facility.submitted().is_empty() {
                    tokio::task::yield_now().await;
                }
                token.cancel();
            }
        );
        let summary = summary.unwrap();

        assert_eq!(summary.succeeded, facility.submitted().len());
        assert_eq!(summary.skipped, 6 - facility.submitted().len());
        assert!(facility.released().is_empty());
        assert!(summary.is_consistent());
    }

    #[tokio::test]
    async fn test_abort_releases_open_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let facility = Arc::new(ScriptedFacility::new().with_default(Script::Hang));
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 2));
        let abort = orchestrator.abort_token();

        let (result, ()) = tokio::join!(
            orchestrator.run(Plan::from_operations(operations(temp_dir.path(), 5))),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                abort.cancel();
            }
        );
        let aborted = result.unwrap_err();

        assert_eq!(aborted.reason, Error::Cancelled);
        assert_eq!(aborted.summary.failed, 2);
        assert_eq!(aborted.summary.skipped, 3);
        assert_eq!(facility.released().len(), 2);
        assert_eq!(facility.open(), 0);
    }

    #[tokio::test]
    async fn test_copy_replaces_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let ops = operations(temp_dir.path(), 1);
        std::fs::create_dir_all(ops[0].destination.parent().unwrap()).unwrap();
        std::fs::write(&ops[0].destination, b"stale").unwrap();

        let facility = Arc::new(ScriptedFacility::new());
        let orchestrator = TransferOrchestrator::new(facility.clone(), fast(TransferMode::Copy, 1));
        orchestrator.run(Plan::from_operations(ops.clone())).await.unwrap();

        assert!(!ops[0].destination.exists());
    }

    #[test]
    fn test_config_from_transfer_section() {
        let section = TransferConfig {
            concurrency: 3,
            mode: TransferMode::Move,
            ..TransferConfig::default()
        };
        let config = OrchestratorConfig::from_config(&section).unwrap();
        assert_eq!(config.concurrency.get(), 3);
        assert_eq!(config.mode, TransferMode::Move);

        let invalid = TransferConfig {
            concurrency: 11,
            ..TransferConfig::default()
        };
        assert_eq!(
            OrchestratorConfig::from_config(&invalid).unwrap_err().kind(),
            ErrorKind::Config
        );
    }
}

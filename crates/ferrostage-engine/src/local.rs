//! In-process transfer facility backed by tokio tasks
//!
//! Each submitted job copies its source into a `.ferrostage-partial` sibling of
//! the destination on a background task. [`complete`](TransferFacility::complete)
//! renames the partial file into place, so a destination is never observed
//! half-written. Interrupted copies are retried every retry interval until the
//! retry timeout runs out.

use crate::facility::{JobHandle, TransferFacility, TransferRequest, TransferState};
use async_trait::async_trait;
use ferrostage_types::{Error, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Suffix of in-flight destination files
pub const PARTIAL_SUFFIX: &str = ".ferrostage-partial";

struct LocalJob {
    destination: PathBuf,
    partial: PathBuf,
    state: watch::Receiver<TransferState>,
    task: JoinHandle<()>,
}

/// Transfer facility that copies files on the local tokio runtime
#[derive(Default)]
pub struct LocalTransferFacility {
    jobs: RwLock<HashMap<JobHandle, LocalJob>>,
}

impl LocalTransferFacility {
    /// Create a new local transfer facility
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles that are still open
    pub async fn open_jobs(&self) -> usize {
        self.jobs.read().await.len()
    }
}

impl std::fmt::Debug for LocalTransferFacility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransferFacility").finish_non_exhaustive()
    }
}

/// Path the data is written to before completion
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

async fn run_transfer(
    request: TransferRequest,
    partial: PathBuf,
    state: watch::Sender<TransferState>,
) {
    let mut stalled_since: Option<Instant> = None;
    loop {
        match fs::copy(&request.source, &partial).await {
            Ok(bytes) => {
                debug!(
                    "Transferred {} bytes from {}",
                    bytes,
                    request.source.display()
                );
                state.send_replace(TransferState::Transferred);
                return;
            }
            Err(e) if is_transient(&e) => {
                let stalled = stalled_since.get_or_insert_with(Instant::now).elapsed();
                if stalled + request.retry.interval() > request.retry.timeout() {
                    state.send_replace(TransferState::Error(format!(
                        "retry timeout exceeded: {e}"
                    )));
                    return;
                }
                warn!(
                    "Transfer of {} stalled, retrying in {:?}: {}",
                    request.source.display(),
                    request.retry.interval(),
                    e
                );
                state.send_replace(TransferState::TransientError(e.to_string()));
                tokio::time::sleep(request.retry.interval()).await;
            }
            Err(e) => {
                state.send_replace(TransferState::Error(e.to_string()));
                return;
            }
        }
    }
}

async fn check_request(request: &TransferRequest) -> Result<()> {
    let source = fs::metadata(&request.source).await.map_err(|e| {
        Error::submission(format!("cannot read {}: {}", request.source.display(), e))
    })?;
    if !source.is_file() {
        return Err(Error::submission(format!(
            "{} is not a file",
            request.source.display()
        )));
    }

    if let Some(parent) = request
        .destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        let parent_is_dir = fs::metadata(parent).await.is_ok_and(|m| m.is_dir());
        if !parent_is_dir {
            return Err(Error::submission(format!(
                "destination directory {} does not exist",
                parent.display()
            )));
        }
    }

    if fs::metadata(&request.destination)
        .await
        .is_ok_and(|m| m.is_dir())
    {
        return Err(Error::submission(format!(
            "destination {} is a directory",
            request.destination.display()
        )));
    }
    Ok(())
}

#[async_trait]
impl TransferFacility for LocalTransferFacility {
    async fn submit(&self, request: &TransferRequest) -> Result<JobHandle> {
        check_request(request).await?;

        let handle = JobHandle::new();
        let partial = partial_path(&request.destination);
        let (sender, receiver) = watch::channel(TransferState::InProgress);
        let task = tokio::spawn(run_transfer(request.clone(), partial.clone(), sender));

        debug!(
            "Submitted job {} ({} -> {}, priority {})",
            handle,
            request.source.display(),
            request.destination.display(),
            request.priority
        );

        self.jobs.write().await.insert(
            handle,
            LocalJob {
                destination: request.destination.clone(),
                partial,
                state: receiver,
                task,
            },
        );
        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<TransferState> {
        let jobs = self.jobs.read().await;
        let job = jobs
            .get(handle)
            .ok_or_else(|| Error::transfer(format!("unknown job {handle}")))?;

        let state = job.state.borrow().clone();
        if state == TransferState::InProgress && job.task.is_finished() {
            return Ok(TransferState::Fatal(
                "transfer task stopped unexpectedly".to_string(),
            ));
        }
        Ok(state)
    }

    async fn complete(&self, handle: &JobHandle) -> Result<()> {
        let job = {
            let mut jobs = self.jobs.write().await;
            let transferred = jobs
                .get(handle)
                .ok_or_else(|| Error::transfer(format!("unknown job {handle}")))?
                .state
                .borrow()
                .clone()
                == TransferState::Transferred;
            if !transferred {
                return Err(Error::transfer(format!("job {handle} has not transferred")));
            }
            jobs.remove(handle)
                .ok_or_else(|| Error::transfer(format!("unknown job {handle}")))?
        };

        fs::rename(&job.partial, &job.destination)
            .await
            .map_err(|e| {
                Error::transfer(format!(
                    "cannot finalize {}: {}",
                    job.destination.display(),
                    e
                ))
            })?;
        debug!("Completed job {}", handle);
        Ok(())
    }

    async fn release(&self, handle: &JobHandle) -> Result<()> {
        let Some(job) = self.jobs.write().await.remove(handle) else {
            return Ok(());
        };

        job.task.abort();
        match fs::remove_file(&job.partial).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io_at(&job.partial, &e)),
        }
        debug!("Released job {}", handle);
        Ok(())
    }
}

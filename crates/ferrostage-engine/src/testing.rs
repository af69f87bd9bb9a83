//! Scripted transfer facility for deterministic orchestration tests
//!
//! Each source path can be given a [`Script`] that decides how its job
//! behaves. The facility never touches the filesystem and records every call,
//! including the highest number of simultaneously open handles.

use crate::facility::{JobHandle, TransferFacility, TransferRequest, TransferState};
use async_trait::async_trait;
use ferrostage_types::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Behaviour of one scripted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Transferred on the first poll
    Succeed,
    /// In progress for the given number of polls, then transferred
    SucceedAfter(usize),
    /// Rejected at submission
    RejectSubmit(String),
    /// Reports `Error` on the first poll
    FailTransfer(String),
    /// Reports `Fatal` on the first poll
    Fatal(String),
    /// Reports `TransientError` forever
    StayTransient(String),
    /// In progress for the given number of polls, then one `TransientError`,
    /// then transferred
    StallOnceAfter(usize, String),
    /// Stays in progress forever
    Hang,
    /// Transfers, but completion fails
    FailComplete(String),
    /// Transfers, but the source cannot be removed afterwards
    FailRemoveSource(String),
}

#[derive(Debug)]
struct ScriptedJob {
    source: PathBuf,
    script: Script,
    polls: usize,
}

#[derive(Debug, Default)]
struct Ledger {
    jobs: HashMap<JobHandle, ScriptedJob>,
    max_open: usize,
    submitted: Vec<PathBuf>,
    completed: Vec<PathBuf>,
    released: Vec<PathBuf>,
    removed_sources: Vec<PathBuf>,
}

/// Transfer facility driven by per-source scripts
#[derive(Debug)]
pub struct ScriptedFacility {
    scripts: HashMap<PathBuf, Script>,
    default_script: Script,
    available: bool,
    ledger: Mutex<Ledger>,
}

impl Default for ScriptedFacility {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFacility {
    /// Create a facility on which every job succeeds immediately
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            default_script: Script::Succeed,
            available: true,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Script the job for `source`
    pub fn with_script(mut self, source: impl Into<PathBuf>, script: Script) -> Self {
        self.scripts.insert(source.into(), script);
        self
    }

    /// Script every job without an explicit script
    pub fn with_default(mut self, script: Script) -> Self {
        self.default_script = script;
        self
    }

    /// Fail the availability probe
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn script_for(&self, source: &Path) -> Script {
        self.scripts
            .get(source)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone())
    }

    /// Handles currently open
    pub fn open(&self) -> usize {
        self.ledger().jobs.len()
    }

    /// Highest number of handles open at once
    pub fn max_open(&self) -> usize {
        self.ledger().max_open
    }

    /// Sources in submission order
    pub fn submitted(&self) -> Vec<PathBuf> {
        self.ledger().submitted.clone()
    }

    /// Sources of completed jobs in completion order
    pub fn completed(&self) -> Vec<PathBuf> {
        self.ledger().completed.clone()
    }

    /// Sources of released jobs in release order
    pub fn released(&self) -> Vec<PathBuf> {
        self.ledger().released.clone()
    }

    /// Sources removed after a move
    pub fn removed_sources(&self) -> Vec<PathBuf> {
        self.ledger().removed_sources.clone()
    }
}

#[async_trait]
impl TransferFacility for ScriptedFacility {
    async fn probe(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::facility_unavailable("scripted outage"))
        }
    }

    async fn submit(&self, request: &TransferRequest) -> Result<JobHandle> {
        let script = self.script_for(&request.source);
        if let Script::RejectSubmit(message) = script {
            return Err(Error::submission(message));
        }

        let handle = JobHandle::new();
        let mut ledger = self.ledger();
        ledger.jobs.insert(
            handle,
            ScriptedJob {
                source: request.source.clone(),
                script,
                polls: 0,
            },
        );
        ledger.max_open = ledger.max_open.max(ledger.jobs.len());
        ledger.submitted.push(request.source.clone());
        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<TransferState> {
        let mut ledger = self.ledger();
        let job = ledger
            .jobs
            .get_mut(handle)
            .ok_or_else(|| Error::transfer(format!("unknown job {handle}")))?;
        job.polls += 1;

        Ok(match &job.script {
            Script::SucceedAfter(polls) if job.polls <= *polls => TransferState::InProgress,
            Script::Hang => TransferState::InProgress,
            Script::FailTransfer(message) | Script::RejectSubmit(message) => {
                TransferState::Error(message.clone())
            }
            Script::Fatal(message) => TransferState::Fatal(message.clone()),
            Script::StayTransient(message) => TransferState::TransientError(message.clone()),
            Script::StallOnceAfter(polls, _) if job.polls <= *polls => TransferState::InProgress,
            Script::StallOnceAfter(polls, message) if job.polls == *polls + 1 => {
                TransferState::TransientError(message.clone())
            }
            Script::Succeed
            | Script::SucceedAfter(_)
            | Script::StallOnceAfter(..)
            | Script::FailComplete(_)
            | Script::FailRemoveSource(_) => TransferState::Transferred,
        })
    }

    async fn complete(&self, handle: &JobHandle) -> Result<()> {
        let mut ledger = self.ledger();
        let job = ledger
            .jobs
            .get(handle)
            .ok_or_else(|| Error::transfer(format!("unknown job {handle}")))?;
        if let Script::FailComplete(message) = &job.script {
            return Err(Error::transfer(message.clone()));
        }

        if let Some(job) = ledger.jobs.remove(handle) {
            ledger.completed.push(job.source);
        }
        Ok(())
    }

    async fn release(&self, handle: &JobHandle) -> Result<()> {
        let mut ledger = self.ledger();
        if let Some(job) = ledger.jobs.remove(handle) {
            ledger.released.push(job.source);
        }
        Ok(())
    }

    async fn remove_source(&self, source: &Path) -> Result<()> {
        if let Script::FailRemoveSource(message) = self.script_for(source) {
            return Err(Error::io(message));
        }
        self.ledger().removed_sources.push(source.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_lifecycle() {
        let facility = ScriptedFacility::new().with_script("/v/slow", Script::SucceedAfter(1));
        let handle = facility
            .submit(&TransferRequest::new("/v/slow", "/stage/v/slow"))
            .await
            .unwrap();

        assert_eq!(facility.poll(&handle).await.unwrap(), TransferState::InProgress);
        assert_eq!(facility.poll(&handle).await.unwrap(), TransferState::Transferred);
        facility.complete(&handle).await.unwrap();

        assert_eq!(facility.open(), 0);
        assert_eq!(facility.max_open(), 1);
        assert_eq!(facility.completed(), vec![PathBuf::from("/v/slow")]);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let facility = ScriptedFacility::new().with_default(Script::Hang);
        let handle = facility
            .submit(&TransferRequest::new("/v/a", "/stage/v/a"))
            .await
            .unwrap();

        facility.release(&handle).await.unwrap();
        facility.release(&handle).await.unwrap();
        assert_eq!(facility.released().len(), 1);
    }
}

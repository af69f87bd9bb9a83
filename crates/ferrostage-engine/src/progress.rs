//! Progress events for front ends

use crate::aggregate::Outcome;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Something observable happened during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Scheduling is about to begin
    RunStarted {
        /// Operations that will be scheduled
        operations: usize,
        /// Bytes those operations cover
        bytes: u64,
    },
    /// A job was accepted by the transfer facility
    JobSubmitted {
        /// Source of the job
        source: PathBuf,
    },
    /// An operation reached its final outcome
    OperationFinished {
        /// Source of the operation
        source: PathBuf,
        /// Final outcome
        outcome: Outcome,
        /// Size in bytes
        size: u64,
    },
}

/// Optional sending side of a progress channel
///
/// Sending never fails the run: a dropped receiver just silences progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// Create a sink that discards every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a sink and the receiver that observes it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Send an event if anyone is listening
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

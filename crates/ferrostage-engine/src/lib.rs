//! Transfer planning, orchestration and result aggregation for ferrostage
//!
//! This crate turns a changeset (or a populated staging area) into transfers
//! and drives them through an external, job-based transfer facility:
//!
//! - **Planning**: re-root changed files beneath a staging root, or map staged
//!   files back to their drives, dropping operations whose source is gone
//! - **Orchestration**: keep a bounded number of jobs open, poll them in
//!   batches and finalize, release or clean up each one
//! - **Aggregation**: one result record per operation and a run summary with
//!   success, failure, partial failure and skip counts
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrostage_engine::{
//!     plan_staging, LocalTransferFacility, OrchestratorConfig, TransferOrchestrator,
//! };
//! use ferrostage_sync::load_changeset;
//! use ferrostage_types::TransferMode;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let changeset = load_changeset("changes.json").await?;
//!     let plan = plan_staging(&changeset, Path::new("/staging")).await;
//!
//!     let orchestrator = TransferOrchestrator::new(
//!         Arc::new(LocalTransferFacility::new()),
//!         OrchestratorConfig::new(TransferMode::Copy),
//!     );
//!     let summary = orchestrator.run(plan).await?;
//!     println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod facility;
pub mod local;
pub mod operation;
pub mod orchestrator;
pub mod planner;
pub mod progress;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aggregate::{CopyRecord, MoveRecord, Outcome, ResultAggregator, ResultRecord, RunSummary};
pub use facility::{JobHandle, TransferFacility, TransferRequest, TransferState};
pub use local::LocalTransferFacility;
pub use operation::{DestinationRoot, Job, JobState, OperationDescriptor, OperationOrigin};
pub use orchestrator::{AbortedRun, OrchestratorConfig, TransferOrchestrator};
pub use planner::{plan_deployment, plan_staging, Plan, SkippedOperation};
pub use progress::{ProgressEvent, ProgressSink};

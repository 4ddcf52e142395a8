//! # skipper-sync
//!
//! Job synchronization and build orchestration against a CI server.
//!
//! - [`document`]: immutable XML document model with canonical output
//! - [`pipeline`]: upstream-trigger codec
//! - [`fingerprint`]: content fingerprints embedded in job descriptions
//! - [`drift`]: detection of jobs edited on the server, job status
//! - [`push`]: [`PushReconciler`]: render, fingerprint and push a batch
//! - [`build`]: [`BuildOrchestrator`]: trigger and poll builds
//! - [`diff`]: unified diffs between server and local jobs

pub mod build;
pub mod diff;
pub mod document;
pub mod drift;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod pipeline;
pub mod push;
pub mod schedule;

#[cfg(test)]
mod test_support;

pub use build::{BuildOrchestrator, BuildOutcome, BuildResult, JobBuild, LogPolicy, ResultNode};
pub use document::{Document, DocumentError, Element};
pub use drift::{DriftFinding, JobStatus};
pub use error::SyncError;
pub use fingerprint::HashScope;
pub use job::JobRenderer;
pub use push::{
    AlwaysReplace, ConflictDecision, ConflictResolver, NeverReplace, PushOutcome, PushPolicy,
    PushReconciler, PushReport, TypeConflict,
};
pub use schedule::{ManualScheduler, PollPolicy, Scheduler, ThreadScheduler};

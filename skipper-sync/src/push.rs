//! Push reconciliation: render, merge, fingerprint and push a batch of jobs.
//!
//! Per job: `Pending → Pushed | Skipped | Blocked` where blocked covers
//! drift refusals, render failures and declined type conflicts. Drift is
//! checked for the whole batch before anything is pushed; a drifted job is
//! refused on its own and the rest of the batch proceeds.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use skipper_core::ServerConfig;
use skipper_remote::{JobServer, RemoteError};

use crate::drift::{check_drift, DriftFinding};
use crate::document::Document;
use crate::fingerprint::{embed_hash, fingerprint, transfer_disabled_flag, HashScope};
use crate::job::JobRenderer;
use crate::SyncError;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Deployment policy for one push run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushPolicy {
    /// Pushes are disabled for the repository.
    pub forbid_push: bool,
    /// Push even when `forbid_push` is set.
    pub force: bool,
    /// Overwrite jobs that were modified on the server.
    pub allow_overwrite: bool,
    /// Keep the server's `disabled` flag instead of the rendered one.
    pub preserve_disabled_flag: bool,
}

impl PushPolicy {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            forbid_push: server.forbid_push,
            preserve_disabled_flag: server.disable_jobs_from_gui,
            ..Self::default()
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Fingerprint scope matching this policy.
    pub fn hash_scope(&self) -> HashScope {
        if self.preserve_disabled_flag {
            HashScope::IgnoreDisabledFlag
        } else {
            HashScope::Full
        }
    }
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// The server refused a push because the existing job has another type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    pub job: String,
    /// Type of the job on the server.
    pub expected: String,
    /// Type of the pushed configuration.
    pub actual: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Delete the server job (and its build history) and push again.
    Replace,
    /// Stop the batch; this job and all later ones stay unpushed.
    Abort,
}

/// Decides how to resolve a [`TypeConflict`].
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &TypeConflict) -> ConflictDecision;
}

/// Always replaces conflicting jobs.
#[derive(Debug, Default)]
pub struct AlwaysReplace;

impl ConflictResolver for AlwaysReplace {
    fn resolve(&mut self, _conflict: &TypeConflict) -> ConflictDecision {
        ConflictDecision::Replace
    }
}

/// Never replaces conflicting jobs.
#[derive(Debug, Default)]
pub struct NeverReplace;

impl ConflictResolver for NeverReplace {
    fn resolve(&mut self, _conflict: &TypeConflict) -> ConflictDecision {
        ConflictDecision::Abort
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Result of pushing one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed,
    /// Not attempted because an earlier conflict stopped the batch.
    Skipped,
    /// Refused by the server; the replacement was declined.
    TypeMismatch { expected: String, actual: String },
    /// Modified on the server and overwriting is not allowed.
    Drifted,
    /// The job could not be rendered locally.
    RenderFailed { reason: String },
}

impl PushOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, PushOutcome::Pushed)
    }
}

/// Outcome of a push run, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub outcomes: Vec<(String, PushOutcome)>,
    pub drift: Vec<DriftFinding>,
}

impl PushReport {
    pub fn pushed(&self) -> Vec<String> {
        self.filter(true)
    }

    pub fn not_pushed(&self) -> Vec<String> {
        self.filter(false)
    }

    pub fn outcome(&self, job: &str) -> Option<&PushOutcome> {
        self.outcomes.iter().find(|(name, _)| name == job).map(|(_, o)| o)
    }

    fn filter(&self, pushed: bool) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_pushed() == pushed)
            .map(|(job, _)| job.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Pushes jobs of one repository to one server under one policy.
pub struct PushReconciler<'a, S: JobServer + ?Sized> {
    server: &'a S,
    renderer: &'a JobRenderer,
    policy: PushPolicy,
}

impl<'a, S: JobServer + ?Sized> PushReconciler<'a, S> {
    pub fn new(server: &'a S, renderer: &'a JobRenderer, policy: PushPolicy) -> Self {
        Self {
            server,
            renderer,
            policy,
        }
    }

    /// Push `jobs` in order. A job named twice is pushed once.
    ///
    /// Fails with [`SyncError::PushForbidden`] before contacting the server
    /// when the policy forbids pushes. Transport and unexpected server
    /// errors abort the run.
    pub fn push(
        &self,
        jobs: &[String],
        resolver: &mut dyn ConflictResolver,
    ) -> Result<PushReport, SyncError> {
        if self.policy.forbid_push && !self.policy.force {
            return Err(SyncError::PushForbidden);
        }

        let mut seen = HashSet::new();
        let jobs: Vec<String> = jobs
            .iter()
            .filter(|job| seen.insert(job.as_str()))
            .cloned()
            .collect();
        let mut outcomes: HashMap<String, PushOutcome> = HashMap::new();
        let mut report = PushReport::default();

        if !self.policy.allow_overwrite {
            for job in &jobs {
                if let Some(finding) = check_drift(self.server, self.renderer, job)? {
                    outcomes.insert(job.clone(), PushOutcome::Drifted);
                    report.drift.push(finding);
                }
            }
        }

        let pending: Vec<&String> = jobs.iter().filter(|j| !outcomes.contains_key(*j)).collect();
        let mut index = 0;
        let mut replaced: Option<&str> = None;
        while index < pending.len() {
            let job = pending[index].as_str();
            let config = match self.prepare(job) {
                Ok(config) => config,
                Err(err) if is_local_failure(&err) => {
                    tracing::warn!("job '{}' not pushed: {}", job, err);
                    outcomes.insert(
                        job.to_string(),
                        PushOutcome::RenderFailed {
                            reason: err.to_string(),
                        },
                    );
                    index += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            match self.server.push_job_config(job, &config) {
                Ok(()) => {
                    tracing::info!("pushed job '{}'", job);
                    outcomes.insert(job.to_string(), PushOutcome::Pushed);
                    index += 1;
                }
                Err(RemoteError::TypeMismatch {
                    expected, actual, ..
                }) => {
                    let conflict = TypeConflict {
                        job: job.to_string(),
                        expected,
                        actual,
                    };
                    // A second mismatch right after a replacement would loop.
                    let decision = if replaced == Some(job) {
                        ConflictDecision::Abort
                    } else {
                        resolver.resolve(&conflict)
                    };
                    match decision {
                        ConflictDecision::Replace => {
                            tracing::info!(
                                "replacing job '{}' ({} -> {})",
                                job,
                                conflict.expected,
                                conflict.actual
                            );
                            match self.server.delete_job(job) {
                                Ok(()) | Err(RemoteError::JobNotFound { .. }) => {}
                                Err(err) => return Err(err.into()),
                            }
                            replaced = Some(job);
                        }
                        ConflictDecision::Abort => {
                            outcomes.insert(
                                job.to_string(),
                                PushOutcome::TypeMismatch {
                                    expected: conflict.expected,
                                    actual: conflict.actual,
                                },
                            );
                            for rest in &pending[index + 1..] {
                                outcomes.insert((*rest).clone(), PushOutcome::Skipped);
                            }
                            break;
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        report.outcomes = jobs
            .iter()
            .map(|job| {
                let outcome = outcomes.remove(job).unwrap_or(PushOutcome::Skipped);
                (job.clone(), outcome)
            })
            .collect();
        Ok(report)
    }

    /// Final configuration text to push for `job`.
    fn prepare(&self, job: &str) -> Result<String, SyncError> {
        let mut doc = self.renderer.render(job)?;
        if self.policy.preserve_disabled_flag {
            if let Some(remote) = self.remote_document(job)? {
                doc = transfer_disabled_flag(&remote, &doc);
            }
        }
        let hash = fingerprint(&doc, self.policy.hash_scope());
        Ok(embed_hash(&doc, &hash).to_xml())
    }

    fn remote_document(&self, job: &str) -> Result<Option<Document>, SyncError> {
        match self.server.get_job_config(job) {
            Ok(xml) => Document::parse(&xml)
                .map(Some)
                .map_err(|source| SyncError::InvalidRemote {
                    job: job.to_string(),
                    source,
                }),
            Err(RemoteError::JobNotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Errors that only concern the local rendering of one job.
fn is_local_failure(err: &SyncError) -> bool {
    matches!(
        err,
        SyncError::Render(_)
            | SyncError::InvalidRendering { .. }
            | SyncError::UnknownJob { .. }
            | SyncError::MalformedTrigger { .. }
    )
}

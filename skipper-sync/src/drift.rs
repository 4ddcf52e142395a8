//! Detection of jobs modified on the server outside skipper.
//!
//! Status precedence for [`job_status`]:
//! 1. `NotOnServer` (the server has no such job)
//! 2. `Unmanaged` (the server copy carries no fingerprint)
//! 3. `Modified` (the server copy no longer matches its own fingerprint)
//! 4. `Outdated` (the server copy differs from the local rendering)
//! 5. `Current`
//!
//! A saved fingerprint is accepted under either [`HashScope`], so switching
//! `disable_jobs_from_gui` does not turn every managed job into drift.

use serde::Serialize;

use skipper_remote::{JobServer, RemoteError};

use crate::diff::{comparable_text, unified_diff};
use crate::document::Document;
use crate::fingerprint::{extract_hash, fingerprint, HashScope};
use crate::job::JobRenderer;
use crate::SyncError;

/// A job whose server copy was edited since skipper last pushed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftFinding {
    pub job: String,
    /// Unified diff from the server copy to the local rendering.
    pub diff: String,
}

/// Synchronization state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotOnServer,
    Unmanaged,
    Modified,
    Outdated,
    Current,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::NotOnServer => "not on server",
            JobStatus::Unmanaged => "unmanaged",
            JobStatus::Modified => "modified on server",
            JobStatus::Outdated => "outdated",
            JobStatus::Current => "current",
        }
    }
}

fn parse_remote(job: &str, xml: &str) -> Result<Document, SyncError> {
    Document::parse(xml).map_err(|source| SyncError::InvalidRemote {
        job: job.to_string(),
        source,
    })
}

fn fetch_remote<S: JobServer + ?Sized>(server: &S, job: &str) -> Result<Option<Document>, SyncError> {
    match server.get_job_config(job) {
        Ok(xml) => Ok(Some(parse_remote(job, &xml)?)),
        Err(RemoteError::JobNotFound { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn matches_saved(saved: &str, stripped: &Document) -> bool {
    [HashScope::Full, HashScope::IgnoreDisabledFlag]
        .into_iter()
        .any(|scope| fingerprint(stripped, scope) == saved)
}

/// Whether `remote` was changed after its fingerprint was embedded.
/// Documents without a fingerprint never drift.
pub fn has_drifted(remote: &Document) -> bool {
    match extract_hash(remote) {
        (Some(saved), stripped) => !matches_saved(&saved, &stripped),
        (None, _) => false,
    }
}

/// Drift check on an already fetched server copy. `local` is only used for
/// the diff and may be absent when the job no longer renders.
pub fn detect_drift(
    job: &str,
    remote: &Document,
    local: Option<&Document>,
) -> Option<DriftFinding> {
    if !has_drifted(remote) {
        return None;
    }
    let local = local.map(comparable_text).unwrap_or_default();
    Some(DriftFinding {
        job: job.to_string(),
        diff: unified_diff(job, &comparable_text(remote), &local),
    })
}

/// Fetch `job` from the server and check it for drift.
pub fn check_drift<S: JobServer + ?Sized>(
    server: &S,
    renderer: &JobRenderer,
    job: &str,
) -> Result<Option<DriftFinding>, SyncError> {
    let Some(remote) = fetch_remote(server, job)? else {
        return Ok(None);
    };
    if !has_drifted(&remote) {
        return Ok(None);
    }
    tracing::warn!("job '{}' was modified on the server", job);
    let local = renderer.render(job).ok();
    Ok(detect_drift(job, &remote, local.as_ref()))
}

/// Classify `job` by comparing its server copy with the local rendering.
///
/// The local rendering is compared under `scope`, so a job stamped under the
/// other scope reports `Outdated` until it is pushed again.
pub fn job_status<S: JobServer + ?Sized>(
    server: &S,
    renderer: &JobRenderer,
    job: &str,
    scope: HashScope,
) -> Result<JobStatus, SyncError> {
    let Some(remote) = fetch_remote(server, job)? else {
        return Ok(JobStatus::NotOnServer);
    };
    let (saved, stripped) = extract_hash(&remote);
    let Some(saved) = saved else {
        return Ok(JobStatus::Unmanaged);
    };
    if !matches_saved(&saved, &stripped) {
        return Ok(JobStatus::Modified);
    }
    let local = renderer.render(job)?;
    if fingerprint(&local, scope) != saved {
        return Ok(JobStatus::Outdated);
    }
    Ok(JobStatus::Current)
}

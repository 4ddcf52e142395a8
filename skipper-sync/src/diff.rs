//! Unified diffs between a job on the server and its local rendering.

use similar::TextDiff;

use skipper_remote::{JobServer, RemoteError};

use crate::document::Document;
use crate::fingerprint::extract_hash;
use crate::job::JobRenderer;
use crate::SyncError;

/// Diff for one job. Empty when both sides match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDiff {
    pub job: String,
    pub unified_diff: String,
}

impl JobDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Canonical, fingerprint-free text of `doc`.
pub fn comparable_text(doc: &Document) -> String {
    let (_, stripped) = extract_hash(doc);
    stripped.to_xml()
}

/// Unified diff from `remote` to `local` with `remote/<job>.xml` and
/// `local/<job>.xml` headers.
pub fn unified_diff(job: &str, remote: &str, local: &str) -> String {
    if remote == local {
        return String::new();
    }
    let old_header = format!("remote/{job}.xml");
    let new_header = format!("local/{job}.xml");
    TextDiff::from_lines(remote, local)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

/// Compare `job` on the server with what a push would send.
///
/// A job missing on the server diffs against empty text.
pub fn job_diff<S: JobServer + ?Sized>(
    server: &S,
    renderer: &JobRenderer,
    job: &str,
) -> Result<JobDiff, SyncError> {
    let local = comparable_text(&renderer.render(job)?);
    let remote = match server.get_job_config(job) {
        Ok(xml) => {
            let doc = Document::parse(&xml).map_err(|source| SyncError::InvalidRemote {
                job: job.to_string(),
                source,
            })?;
            comparable_text(&doc)
        }
        Err(RemoteError::JobNotFound { .. }) => String::new(),
        Err(err) => return Err(err.into()),
    };
    Ok(JobDiff {
        job: job.to_string(),
        unified_diff: unified_diff(job, &remote, &local),
    })
}

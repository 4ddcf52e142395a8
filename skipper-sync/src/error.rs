//! Error types for skipper-sync.

use thiserror::Error;

use skipper_core::RepoError;
use skipper_remote::RemoteError;
use skipper_renderer::RenderError;

use crate::document::DocumentError;

/// All errors that can arise from synchronization and build operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An error loading the job repository.
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    /// An error talking to the CI server.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A job's rendered template is not well-formed XML.
    #[error("job '{job}' rendered an invalid document: {source}")]
    InvalidRendering {
        job: String,
        #[source]
        source: DocumentError,
    },

    /// The server returned a configuration that is not well-formed XML.
    #[error("server configuration of job '{job}' is invalid: {source}")]
    InvalidRemote {
        job: String,
        #[source]
        source: DocumentError,
    },

    /// The job is not declared in `jobs.yaml`.
    #[error("job '{job}' is not defined in the repository")]
    UnknownJob { job: String },

    /// A pipeline trigger could not be read or written.
    #[error("malformed pipeline trigger: {reason}")]
    MalformedTrigger { reason: String },

    /// Pushes are disabled for this repository and `--force` was not given.
    #[error("pushes are not allowed for this repository (use --force to push anyway)")]
    PushForbidden,
}

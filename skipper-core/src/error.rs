//! Error types for skipper-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading a job repository.
#[derive(Debug, Error)]
pub enum RepoError {
    /// I/O failure with the offending path attached.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A context mapping could not be represented as template data
    /// (typically a non-string mapping key).
    #[error("invalid context in {path}: {source}")]
    Context {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No `skipper.yaml` was found in `start` or any of its ancestors.
    #[error("not inside a skipper repository (searched upwards from {start})")]
    RepositoryNotFound { start: PathBuf },

    /// Job names requested on the command line that `jobs.yaml` does not define.
    #[error("unknown jobs: {}", names.join(", "))]
    UnknownJobs { names: Vec<String> },

    /// A pipeline threshold outside SUCCESS / UNSTABLE / FAILURE.
    #[error("invalid link type '{value}'; expected one of SUCCESS, UNSTABLE, FAILURE")]
    InvalidLinkType { value: String },

    /// A `VAR=VALUE` override missing its `=`.
    #[error("malformed context var '{spec}'; expected VAR=VALUE")]
    MalformedContextVar { spec: String },

    /// A `NAME=VALUE` build parameter missing its `=`.
    #[error("malformed build parameter '{spec}'; expected NAME=VALUE")]
    MalformedParameter { spec: String },
}

/// Convenience constructor for [`RepoError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RepoError {
    RepoError::Io {
        path: path.into(),
        source,
    }
}

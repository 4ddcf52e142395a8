//! Error types for skipper-remote.

use thiserror::Error;

/// Errors surfaced by [`crate::JobServer`] implementations.
///
/// `JobNotFound`, `TypeMismatch` and `QueueItemNotFound` are expected
/// outcomes the engine handles; everything else aborts the current run.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The job does not exist on the server.
    #[error("job '{job}' not found on the server")]
    JobNotFound { job: String },

    /// The server refused a config push because the existing job has a
    /// different type. `expected` is the server-side type, `actual` the
    /// pushed one.
    #[error("job '{job}' type mismatch: server has {expected}, pushed {actual}")]
    TypeMismatch {
        job: String,
        expected: String,
        actual: String,
    },

    /// The queue item is gone (expired or purged); the build's fate is unknown.
    #[error("queue item {handle} not found")]
    QueueItemNotFound { handle: String },

    /// Non-success HTTP status other than the cases above.
    #[error("HTTP {status} from {url}: {body}")]
    Http { url: String, status: u16, body: String },

    /// Connection-level failure (DNS, TLS, refused, timeout, ...).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with something we cannot interpret.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    /// The configured server location is not an http(s) URL.
    #[error("invalid server location '{location}'")]
    InvalidLocation { location: String },
}

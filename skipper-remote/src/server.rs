//! The [`JobServer`] trait and the values exchanged with the server.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Server-assigned location of a build request that has not yet become a
/// build. Consumed by the first resolution or by a not-found answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueHandle(pub String);

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Location of a build (or of a sub-run of a multi-configuration build).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildLocation(pub String);

impl fmt::Display for BuildLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BuildLocation {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Terminal result of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
}

impl Outcome {
    /// Parse the server's result name.
    pub fn from_server(name: &str) -> Option<Outcome> {
        match name {
            "SUCCESS" => Some(Outcome::Success),
            "UNSTABLE" => Some(Outcome::Unstable),
            "FAILURE" => Some(Outcome::Failure),
            "ABORTED" => Some(Outcome::Aborted),
            "NOT_BUILT" => Some(Outcome::NotBuilt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Unstable => "UNSTABLE",
            Outcome::Failure => "FAILURE",
            Outcome::Aborted => "ABORTED",
            Outcome::NotBuilt => "NOT_BUILT",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a build has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Terminal(Outcome),
}

impl BuildStatus {
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            BuildStatus::Pending => None,
            BuildStatus::Terminal(outcome) => Some(*outcome),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Terminal(_))
    }
}

/// State of a queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    /// Still waiting for an executor.
    Queued,
    /// Cancelled before it started; no build will ever exist.
    Cancelled,
    /// Assigned to a build.
    Ready(BuildLocation),
}

/// Build information as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub status: BuildStatus,
    /// Sub-runs of a multi-configuration build; empty otherwise.
    pub runs: Vec<BuildLocation>,
    /// Human-readable name, e.g. `matrix » linux #12`.
    pub display_name: Option<String>,
}

impl BuildInfo {
    pub fn pending() -> Self {
        Self {
            status: BuildStatus::Pending,
            runs: Vec::new(),
            display_name: None,
        }
    }

    pub fn finished(outcome: Outcome) -> Self {
        Self {
            status: BuildStatus::Terminal(outcome),
            runs: Vec::new(),
            display_name: None,
        }
    }

    pub fn with_runs(mut self, runs: Vec<BuildLocation>) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Remote CI server operations.
///
/// One implementation holds one authenticated session, shared read-only by
/// every call of a run. Calls block on I/O; implementations never retry.
pub trait JobServer {
    /// Raw configuration document of `job`, or [`RemoteError::JobNotFound`].
    fn get_job_config(&self, job: &str) -> Result<String, RemoteError>;

    /// Create or replace `job` with `config`. Fails with
    /// [`RemoteError::TypeMismatch`] when the existing job has another type.
    fn push_job_config(&self, job: &str, config: &str) -> Result<(), RemoteError>;

    /// Delete `job` and its build history.
    fn delete_job(&self, job: &str) -> Result<(), RemoteError>;

    /// Request a build of `job`, returning the queue handle.
    fn trigger_build(
        &self,
        job: &str,
        parameters: &[(String, String)],
    ) -> Result<QueueHandle, RemoteError>;

    /// Current state of a queue item, or [`RemoteError::QueueItemNotFound`].
    fn queue_item(&self, handle: &QueueHandle) -> Result<QueueStatus, RemoteError>;

    /// Build information at `location`.
    fn build_info(&self, location: &BuildLocation) -> Result<BuildInfo, RemoteError>;

    /// Console log of the build at `location`.
    fn build_log(&self, location: &BuildLocation) -> Result<String, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_names_round_trip() {
        for name in ["SUCCESS", "UNSTABLE", "FAILURE", "ABORTED", "NOT_BUILT"] {
            assert_eq!(Outcome::from_server(name).unwrap().as_str(), name);
        }
        assert!(Outcome::from_server("BLUE").is_none());
    }

    #[test]
    fn build_status_helpers() {
        assert!(BuildStatus::Pending.outcome().is_none());
        assert!(!BuildStatus::Pending.is_terminal());
        let done = BuildStatus::Terminal(Outcome::Unstable);
        assert_eq!(done.outcome(), Some(Outcome::Unstable));
        assert!(done.is_terminal());
    }

    #[test]
    fn build_status_serializes_tagged() {
        let json = serde_json::to_value(BuildStatus::Terminal(Outcome::Failure)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "terminal", "outcome": "FAILURE"}));
        let json = serde_json::to_value(BuildStatus::Pending).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pending"}));
    }
}

//! Domain types for a skipper job repository.
//!
//! Job definitions are immutable for the duration of a synchronization run.
//! All types are serializable via serde so `status --json` and tests can
//! round-trip them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::RepoError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a job on the CI server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobName(pub String);

impl JobName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for JobName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Minimum upstream outcome that triggers a downstream job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkType {
    Success,
    Unstable,
    Failure,
}

impl LinkType {
    /// All link types, strongest threshold first.
    pub fn all() -> &'static [LinkType] {
        &[LinkType::Success, LinkType::Unstable, LinkType::Failure]
    }

    /// Name used by the server inside `<threshold><name>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Success => "SUCCESS",
            LinkType::Unstable => "UNSTABLE",
            LinkType::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SUCCESS" => Ok(LinkType::Success),
            "UNSTABLE" => Ok(LinkType::Unstable),
            "FAILURE" => Ok(LinkType::Failure),
            other => Err(RepoError::InvalidLinkType {
                value: other.to_string(),
            }),
        }
    }
}

/// Upstream-trigger relationship of a job: build it when all of
/// `upstream_projects` complete with at least `link_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub upstream_projects: Vec<String>,
    pub link_type: LinkType,
}

impl PipelineInfo {
    pub fn new(upstream_projects: Vec<String>, link_type: LinkType) -> Self {
        Self {
            upstream_projects,
            link_type,
        }
    }
}

/// Pipeline declarations keyed by downstream job name. An entry that could
/// not be parsed holds the reason instead.
pub type PipelineMap = BTreeMap<String, Result<PipelineInfo, String>>;

// ---------------------------------------------------------------------------
// Job definitions
// ---------------------------------------------------------------------------

/// A job as declared in `jobs.yaml`, with its context already merged over
/// the repository's default context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: JobName,
    /// Template path relative to the repository's `templates/` directory.
    pub template: String,
    #[serde(default)]
    pub context: Context,
}

/// Ordered collection of job definitions (file order of `jobs.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSet {
    jobs: Vec<JobDefinition>,
}

impl JobSet {
    pub fn new(jobs: Vec<JobDefinition>) -> Self {
        Self { jobs }
    }

    pub fn get(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|job| job.name.0 == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.name.0.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Validate a requested selection of job names.
    ///
    /// An empty request selects every job in file order. Duplicates are
    /// dropped, keeping the first occurrence. Unknown names are all reported
    /// at once.
    pub fn select(&self, requested: &[String]) -> Result<Vec<String>, RepoError> {
        if requested.is_empty() {
            return Ok(self.names());
        }
        let mut unknown: Vec<String> = requested
            .iter()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            unknown.dedup();
            return Err(RepoError::UnknownJobs { names: unknown });
        }
        let mut selected: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if !selected.contains(name) {
                selected.push(name.clone());
            }
        }
        Ok(selected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> JobDefinition {
        JobDefinition {
            name: JobName::from(name),
            template: format!("{name}.xml"),
            context: Context::new(),
        }
    }

    #[test]
    fn job_name_display() {
        assert_eq!(JobName::from("basic").to_string(), "basic");
        assert_eq!(JobName::from(String::from("x")), JobName::from("x"));
    }

    #[test]
    fn link_type_parses_known_names() {
        for link in LinkType::all() {
            assert_eq!(link.as_str().parse::<LinkType>().unwrap(), *link);
        }
    }

    #[test]
    fn link_type_rejects_unknown_name() {
        let err = "ABORTED".parse::<LinkType>().unwrap_err();
        assert!(matches!(err, RepoError::InvalidLinkType { ref value } if value == "ABORTED"));
    }

    #[test]
    fn link_type_serde_uses_server_names() {
        let yaml = serde_yaml::to_string(&LinkType::Unstable).unwrap();
        assert_eq!(yaml.trim(), "UNSTABLE");
        let parsed: LinkType = serde_yaml::from_str("FAILURE").unwrap();
        assert_eq!(parsed, LinkType::Failure);
    }

    #[test]
    fn select_empty_returns_all_in_order() {
        let set = JobSet::new(vec![job("b"), job("a")]);
        assert_eq!(set.select(&[]).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn select_reports_every_unknown_job() {
        let set = JobSet::new(vec![job("a")]);
        let err = set
            .select(&["zz".to_string(), "a".to_string(), "yy".to_string()])
            .unwrap_err();
        match err {
            RepoError::UnknownJobs { names } => assert_eq!(names, vec!["yy", "zz"]),
            other => panic!("expected UnknownJobs, got {other:?}"),
        }
    }

    #[test]
    fn select_keeps_requested_order_without_duplicates() {
        let set = JobSet::new(vec![job("a"), job("b"), job("c")]);
        let selected = set
            .select(&["c".to_string(), "a".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(selected, vec!["c", "a"]);
    }
}

//! On-disk job repository.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   skipper.yaml           server + policy configuration (marks the root)
//!   jobs.yaml              <job>: {template: <path>, context: {...}}
//!   default_context.yaml   optional, merged under every job context
//!   pipelines.yaml         optional, <job>: {parents: [...], link_type: SUCCESS}
//!   templates/             template files referenced from jobs.yaml
//! ```
//!
//! Loaders take the repository root explicitly; tests point them at a
//! `TempDir`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::context::{deep_merge, expand_dotted_keys, Context};
use crate::error::{io_err, RepoError};
use crate::types::{JobDefinition, JobName, JobSet, LinkType, PipelineInfo, PipelineMap};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<root>/skipper.yaml`
pub fn config_path(root: &Path) -> PathBuf {
    root.join("skipper.yaml")
}

/// `<root>/jobs.yaml`
pub fn jobs_path(root: &Path) -> PathBuf {
    root.join("jobs.yaml")
}

/// `<root>/default_context.yaml`
pub fn default_context_path(root: &Path) -> PathBuf {
    root.join("default_context.yaml")
}

/// `<root>/pipelines.yaml`
pub fn pipelines_path(root: &Path) -> PathBuf {
    root.join("pipelines.yaml")
}

/// `<root>/templates/`
pub fn templates_dir(root: &Path) -> PathBuf {
    root.join("templates")
}

/// Walk up from `start` to the first directory containing `skipper.yaml`.
pub fn find_root(start: &Path) -> Result<PathBuf, RepoError> {
    let mut cur = Some(start);
    while let Some(dir) = cur {
        if config_path(dir).is_file() {
            return Ok(dir.to_path_buf());
        }
        cur = dir.parent();
    }
    Err(RepoError::RepositoryNotFound {
        start: start.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawJob {
    template: String,
    #[serde(default)]
    context: Option<YamlValue>,
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    #[serde(default)]
    parents: Vec<String>,
    link_type: String,
}

fn read_optional(path: &Path) -> Result<Option<String>, RepoError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn yaml_to_context(value: YamlValue, path: &Path) -> Result<Context, RepoError> {
    if value.is_null() {
        return Ok(Context::new());
    }
    let json = serde_json::to_value(value).map_err(|source| RepoError::Context {
        path: path.to_path_buf(),
        source,
    })?;
    match json {
        serde_json::Value::Object(map) => Ok(expand_dotted_keys(&map)),
        other => Err(RepoError::Context {
            path: path.to_path_buf(),
            source: serde::de::Error::custom(format!("expected a mapping, got {other}")),
        }),
    }
}

/// Load `default_context.yaml`; a missing file is an empty context.
pub fn load_default_context_at(root: &Path) -> Result<Context, RepoError> {
    let path = default_context_path(root);
    let Some(contents) = read_optional(&path)? else {
        return Ok(Context::new());
    };
    let value: YamlValue = serde_yaml::from_str(&contents).map_err(|source| RepoError::Parse {
        path: path.clone(),
        source,
    })?;
    yaml_to_context(value, &path)
}

/// Load `jobs.yaml`, merging every job context over the default context.
///
/// Jobs keep their `jobs.yaml` order.
pub fn load_job_definitions_at(root: &Path) -> Result<JobSet, RepoError> {
    let defaults = load_default_context_at(root)?;
    let path = jobs_path(root);
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(JobSet::default());
    }
    let mapping: Mapping = serde_yaml::from_str(&contents).map_err(|source| RepoError::Parse {
        path: path.clone(),
        source,
    })?;

    let mut jobs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = job_key(key, &path)?;
        let raw: RawJob = serde_yaml::from_value(value).map_err(|source| RepoError::Parse {
            path: path.clone(),
            source,
        })?;
        let own = yaml_to_context(raw.context.unwrap_or(YamlValue::Null), &path)?;
        jobs.push(JobDefinition {
            name: JobName::from(name),
            template: raw.template,
            context: deep_merge(&defaults, &own),
        });
    }
    Ok(JobSet::new(jobs))
}

fn job_key(key: YamlValue, path: &Path) -> Result<String, RepoError> {
    match key {
        YamlValue::String(name) => Ok(name),
        other => Err(RepoError::Parse {
            path: path.to_path_buf(),
            source: serde::de::Error::custom(format!("job names must be strings, got {other:?}")),
        }),
    }
}

/// Load `pipelines.yaml`; a missing file declares no pipelines.
///
/// An entry that cannot be turned into a trigger is kept as an error for
/// that job alone, so the other declarations stay usable.
pub fn load_pipelines_at(root: &Path) -> Result<PipelineMap, RepoError> {
    let path = pipelines_path(root);
    let Some(contents) = read_optional(&path)? else {
        return Ok(PipelineMap::new());
    };
    if contents.trim().is_empty() {
        return Ok(PipelineMap::new());
    }
    let raw: std::collections::BTreeMap<String, YamlValue> =
        serde_yaml::from_str(&contents).map_err(|source| RepoError::Parse {
            path: path.clone(),
            source,
        })?;

    Ok(raw
        .into_iter()
        .map(|(job, value)| (job, parse_pipeline(value)))
        .collect())
}

fn parse_pipeline(value: YamlValue) -> Result<PipelineInfo, String> {
    let entry: RawPipeline = serde_yaml::from_value(value).map_err(|err| err.to_string())?;
    let link_type: LinkType = entry
        .link_type
        .parse()
        .map_err(|err: RepoError| err.to_string())?;
    let parents: Vec<String> = entry
        .parents
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parents.is_empty() {
        return Err("no parent jobs listed".to_string());
    }
    if let Some(name) = parents.iter().find(|p| p.contains(',')) {
        return Err(format!("parent name '{name}' contains a comma"));
    }
    Ok(PipelineInfo::new(parents, link_type))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Local rendering of a job: template + context, then pipeline trigger.

use std::path::Path;

use skipper_core::{repository, Context, JobSet, PipelineMap};
use skipper_renderer::{job_context, TemplateEngine};

use crate::document::Document;
use crate::pipeline::merge_pipeline;
use crate::SyncError;

/// Renders jobs of one repository. Built once per run.
pub struct JobRenderer {
    engine: TemplateEngine,
    jobs: JobSet,
    pipelines: PipelineMap,
    overrides: Context,
}

impl JobRenderer {
    pub fn new(
        engine: TemplateEngine,
        jobs: JobSet,
        pipelines: PipelineMap,
        overrides: Context,
    ) -> Self {
        Self {
            engine,
            jobs,
            pipelines,
            overrides,
        }
    }

    /// Load templates, job definitions and pipelines of the repository at
    /// `root`.
    pub fn from_root(root: &Path, overrides: Context) -> Result<Self, SyncError> {
        let engine = TemplateEngine::from_dir(&repository::templates_dir(root))?;
        let jobs = repository::load_job_definitions_at(root)?;
        let pipelines = repository::load_pipelines_at(root)?;
        Ok(Self::new(engine, jobs, pipelines, overrides))
    }

    pub fn jobs(&self) -> &JobSet {
        &self.jobs
    }

    /// Raw template output for `job`, before any document processing.
    pub fn render_raw(&self, job: &str) -> Result<String, SyncError> {
        let def = self.jobs.get(job).ok_or_else(|| SyncError::UnknownJob {
            job: job.to_string(),
        })?;
        let ctx = job_context(def, &self.overrides);
        Ok(self.engine.render(&def.template, &ctx)?)
    }

    /// The document for `job` as it should exist on the server, without a
    /// fingerprint.
    pub fn render(&self, job: &str) -> Result<Document, SyncError> {
        let xml = self.render_raw(job)?;
        let doc = Document::parse(&xml).map_err(|source| SyncError::InvalidRendering {
            job: job.to_string(),
            source,
        })?;
        match self.pipelines.get(job) {
            Some(Ok(info)) => merge_pipeline(&doc, &info.upstream_projects, info.link_type),
            Some(Err(reason)) => Err(SyncError::MalformedTrigger {
                reason: format!("pipeline of job '{job}': {reason}"),
            }),
            None => Ok(doc),
        }
    }
}

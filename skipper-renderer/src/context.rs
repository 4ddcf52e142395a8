//! Template context: merged job context converted for tera.

use skipper_core::context::deep_merge;
use skipper_core::{Context, JobDefinition};

use crate::error::RenderError;

/// Final context for a job: its definition context (defaults already
/// merged in) with command-line overrides deep-merged on top.
pub fn job_context(job: &JobDefinition, overrides: &Context) -> Context {
    deep_merge(&job.context, overrides)
}

/// Convert a context into a [`tera::Context`] for rendering.
pub fn to_tera_context(ctx: &Context) -> Result<tera::Context, RenderError> {
    tera::Context::from_serialize(ctx).map_err(RenderError::from)
}

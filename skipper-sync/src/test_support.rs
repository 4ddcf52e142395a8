//! Shared fixtures for unit tests.

use serde_json::json;
use skipper_core::{Context, JobDefinition, JobName, JobSet, LinkType, PipelineInfo, PipelineMap};
use skipper_renderer::TemplateEngine;

use crate::job::JobRenderer;

pub const BASIC: &str = "<project><description>{{ description | default(value='') }}</description>\
<disabled>false</disabled><triggers/><builders><cmd>{{ cmd }}</cmd></builders></project>";

pub const NODESC: &str = "<project><disabled>false</disabled><triggers/><builders/></project>";

pub const MATRIX: &str = "<matrix-project><description/><disabled>false</disabled><triggers/></matrix-project>";

fn def(name: &str, template: &str, ctx: serde_json::Value) -> JobDefinition {
    JobDefinition {
        name: JobName::from(name),
        template: template.to_string(),
        context: ctx.as_object().cloned().unwrap_or_default(),
    }
}

/// Jobs `up`, `down` (triggered by `up`), `matrix`, `broken` (invalid XML),
/// `missing` (unknown template), `nodesc` (no `<description>`) and `loose`
/// (unparseable pipeline entry).
pub fn renderer() -> JobRenderer {
    let engine = TemplateEngine::from_templates([
        ("basic.txt", BASIC),
        ("matrix.xml", MATRIX),
        ("broken.xml", "<project><oops></project>"),
        ("nodesc.xml", NODESC),
    ])
    .unwrap();
    let jobs = JobSet::new(vec![
        def("up", "basic.txt", json!({"cmd": "make"})),
        def("down", "basic.txt", json!({"cmd": "deploy"})),
        def("matrix", "matrix.xml", json!({})),
        def("broken", "broken.xml", json!({})),
        def("missing", "nope.xml", json!({})),
        def("nodesc", "nodesc.xml", json!({})),
        def("loose", "basic.txt", json!({"cmd": "lint"})),
    ]);
    let mut pipelines = PipelineMap::new();
    pipelines.insert(
        "down".to_string(),
        Ok(PipelineInfo::new(vec!["up".to_string()], LinkType::Success)),
    );
    pipelines.insert(
        "loose".to_string(),
        Err("invalid link type 'SOMETIMES'".to_string()),
    );
    JobRenderer::new(engine, jobs, pipelines, Context::new())
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

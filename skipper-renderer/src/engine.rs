//! Tera rendering engine over a repository's `templates/` directory.
//!
//! Template identifiers are paths relative to the templates directory,
//! normalised to forward slashes (`deploy/config.xml`). Every file in the
//! directory is loaded, whatever its extension, so templates can include or
//! extend each other.

use std::path::{Path, PathBuf};

use tera::Tera;

use skipper_core::Context;

use crate::context::to_tera_context;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    files.sort();
    let mut templates = Vec::with_capacity(files.len());
    for path in files {
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(templates: Vec<(String, String)>) -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    // Job configurations are XML, but values are inserted verbatim.
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(templates)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine rendering job configuration documents.
///
/// Create once per run with [`TemplateEngine::from_dir`] and reuse.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load every file under `templates_dir`. A missing directory yields an
    /// engine without templates.
    pub fn from_dir(templates_dir: &Path) -> Result<Self, RenderError> {
        let tera = build_tera(load_templates(templates_dir)?)?;
        Ok(TemplateEngine { tera })
    }

    /// Build an engine from in-memory `(name, contents)` pairs.
    pub fn from_templates<I, N, C>(templates: I) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let templates = templates
            .into_iter()
            .map(|(name, contents)| (name.into(), contents.into()))
            .collect();
        Ok(TemplateEngine { tera: build_tera(templates)? })
    }

    /// Whether `name` resolves to a loaded template.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render template `name` with `ctx`.
    ///
    /// Returns [`RenderError::TemplateNotFound`] when `name` is unknown.
    pub fn render(&self, name: &str, ctx: &Context) -> Result<String, RenderError> {
        let name = name.replace('\\', "/");
        if !self.has_template(&name) {
            return Err(RenderError::TemplateNotFound { name });
        }
        let tera_ctx = to_tera_context(ctx)?;
        let rendered = self.tera.render(&name, &tera_ctx)?;
        Ok(rendered.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Subcommand implementations and the options they share.

pub mod build;
pub mod diff;
pub mod push;
pub mod render;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::Args;
use colored::Colorize;

use skipper_core::{
    config::load_config_at,
    context::{parse_build_parameters, parse_context_vars},
    repository::find_root,
    Context, RepoConfig,
};
use skipper_remote::JenkinsClient;
use skipper_sync::JobRenderer;

// ---------------------------------------------------------------------------
// Shared arguments
// ---------------------------------------------------------------------------

/// Repository location.
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    /// Repository directory (or any directory below it).
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,
}

/// Template context overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Override a context variable; dotted names set nested keys.
    #[arg(short = 'c', long = "context", value_name = "VAR=VALUE")]
    pub vars: Vec<String>,
}

impl ContextArgs {
    pub fn overrides(&self) -> Result<Context> {
        parse_context_vars(&self.vars).context("invalid --context value")
    }
}

/// Build parameters.
#[derive(Args, Debug, Clone, Default)]
pub struct ParameterArgs {
    /// Pass a parameter to the builds; repeat for several parameters.
    #[arg(short = 'p', long = "parameter", value_name = "NAME=VALUE")]
    pub parameters: Vec<String>,
}

impl ParameterArgs {
    pub fn parse(&self) -> Result<Vec<(String, String)>> {
        parse_build_parameters(&self.parameters).context("invalid --parameter value")
    }
}

// ---------------------------------------------------------------------------
// Repository session
// ---------------------------------------------------------------------------

/// A loaded repository: configuration and job renderer.
pub struct Session {
    pub config: RepoConfig,
    pub renderer: JobRenderer,
}

impl Session {
    pub fn open(dir: &Path, overrides: Context) -> Result<Self> {
        let start = dir
            .canonicalize()
            .with_context(|| format!("cannot access '{}'", dir.display()))?;
        let root = find_root(&start)
            .with_context(|| format!("'{}' is not inside a skipper repository", dir.display()))?;
        let config = load_config_at(&root)
            .context("failed to load skipper.yaml")?
            .with_env_overrides();
        let renderer = JobRenderer::from_root(&root, overrides)
            .with_context(|| format!("failed to load repository at {}", root.display()))?;
        tracing::debug!("repository root: {}", root.display());
        Ok(Self {
            config,
            renderer,
        })
    }

    /// Validate `requested` job names; none means every job.
    pub fn select(&self, requested: &[String]) -> Result<Vec<String>> {
        Ok(self.renderer.jobs().select(requested)?)
    }

    pub fn client(&self) -> Result<JenkinsClient> {
        connect(&self.config)
    }
}

/// Client for the server configured in `config`.
pub fn connect(config: &RepoConfig) -> Result<JenkinsClient> {
    let location = config.server.location.trim();
    if location.is_empty() {
        bail!(
            "no server location: set server.location in skipper.yaml or {}",
            skipper_core::config::SERVER_LOCATION_ENV
        );
    }
    let client = JenkinsClient::new(location).context("invalid server location")?;
    tracing::info!("using server {}", client.display_location());
    Ok(client)
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// Print a unified diff with colored headers and hunks.
pub fn print_diff(diff: &str) {
    for line in diff.lines() {
        if line.starts_with("---") || line.starts_with("+++") {
            println!("{}", line.white().bold());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}

/// Print a titled list of job names; nothing for an empty list.
pub fn print_jobs_list(label: &str, jobs: &[String], color: colored::Color) {
    if jobs.is_empty() {
        return;
    }
    println!();
    println!("{}", label.color(color).bold());
    for job in jobs {
        println!("  {}", job.color(color));
    }
}

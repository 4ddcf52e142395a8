//! `skipper diff`: server copy versus local rendering, per job.

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Args;

use skipper_sync::diff::job_diff;

use super::{print_diff, ContextArgs, RepoArgs, Session};

/// Arguments for `skipper diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Jobs to compare (default: every job in the repository).
    pub jobs: Vec<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub context: ContextArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<ExitCode> {
        let session = Session::open(&self.repo.dir, self.context.overrides()?)?;
        let jobs = session.select(&self.jobs)?;
        let client = session.client()?;

        for job in &jobs {
            let diff = job_diff(&client, &session.renderer, job)
                .with_context(|| format!("failed to diff '{job}'"))?;
            if diff.is_empty() {
                println!("No differences for '{job}'.");
            } else {
                print_diff(&diff.unified_diff);
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

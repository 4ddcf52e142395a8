//! `skipper render`: print the configuration a push would send.

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Args;

use super::{ContextArgs, RepoArgs, Session};

/// Arguments for `skipper render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Job to render.
    pub job: String,

    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub context: ContextArgs,
}

impl RenderArgs {
    pub fn run(self) -> Result<ExitCode> {
        let session = Session::open(&self.repo.dir, self.context.overrides()?)?;
        session.select(std::slice::from_ref(&self.job))?;
        let doc = session
            .renderer
            .render(&self.job)
            .with_context(|| format!("failed to render '{}'", self.job))?;
        print!("{}", doc.to_xml());
        Ok(ExitCode::SUCCESS)
    }
}

//! `skipper status`: synchronization state of each job.

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use skipper_sync::{drift::job_status, JobStatus, PushPolicy};

use super::{RepoArgs, Session};

/// Arguments for `skipper status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Jobs to inspect (default: every job in the repository).
    pub jobs: Vec<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusRowJson {
    job: String,
    status: JobStatus,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "job")]
    job: String,
    #[tabled(rename = "status")]
    status: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<ExitCode> {
        let session = Session::open(&self.repo.dir, Default::default())?;
        let jobs = session.select(&self.jobs)?;
        let client = session.client()?;
        let scope = PushPolicy::from_config(&session.config.server).hash_scope();

        let mut rows = Vec::with_capacity(jobs.len());
        for job in jobs {
            let status = job_status(&client, &session.renderer, &job, scope)
                .with_context(|| format!("status check failed for '{job}'"))?;
            rows.push(StatusRowJson { job, status });
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(ExitCode::SUCCESS);
        }

        if rows.is_empty() {
            println!("No jobs defined.");
            return Ok(ExitCode::SUCCESS);
        }
        let needs_push = rows
            .iter()
            .filter(|r| matches!(r.status, JobStatus::NotOnServer | JobStatus::Outdated))
            .count();
        let modified = rows
            .iter()
            .filter(|r| r.status == JobStatus::Modified)
            .count();
        let table_rows: Vec<StatusTableRow> = rows
            .into_iter()
            .map(|row| StatusTableRow {
                job: row.job,
                status: row.status.label().to_string(),
            })
            .collect();
        let mut table = Table::new(table_rows);
        table.with(Style::rounded());
        println!("{table}");

        if modified > 0 {
            println!(
                "{}",
                format!("{modified} job(s) were modified on the server; see 'skipper diff'.").red()
            );
        }
        if needs_push > 0 {
            println!(
                "{}",
                format!("Run 'skipper push' to update {needs_push} job(s).").yellow()
            );
        }
        Ok(ExitCode::SUCCESS)
    }
}

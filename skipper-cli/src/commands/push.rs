//! `skipper push`: deploy rendered jobs to the server.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::{Color, Colorize};

use skipper_sync::{
    AlwaysReplace, ConflictDecision, ConflictResolver, PushOutcome, PushPolicy, PushReconciler,
    TypeConflict,
};

use super::{
    build::{run_builds, WaitArgs},
    connect, print_diff, print_jobs_list, ContextArgs, ParameterArgs, RepoArgs, Session,
};

/// Arguments for `skipper push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Jobs to push (default: every job in the repository).
    pub jobs: Vec<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Push even if the repository forbids pushes.
    #[arg(long)]
    pub force: bool,

    /// Overwrite jobs that were modified on the server.
    #[arg(long)]
    pub allow_overwrite: bool,

    /// Trigger builds of the pushed jobs.
    #[arg(short = 'b', long)]
    pub build: bool,

    /// Replace jobs whose type changed without asking.
    #[arg(long)]
    pub no_confirm_replace: bool,

    #[command(flatten)]
    pub context: ContextArgs,

    #[command(flatten)]
    pub parameters: ParameterArgs,

    #[command(flatten)]
    pub wait: WaitArgs,
}

impl PushArgs {
    pub fn run(self) -> Result<ExitCode> {
        let parameters = self.parameters.parse()?;
        let session = Session::open(&self.repo.dir, self.context.overrides()?)?;
        let jobs = session.select(&self.jobs)?;
        let policy = PushPolicy::from_config(&session.config.server)
            .with_force(self.force)
            .with_allow_overwrite(self.allow_overwrite);

        // Checked before connecting so a forbidden push never needs a server.
        if policy.forbid_push && !policy.force {
            return Err(skipper_sync::SyncError::PushForbidden.into());
        }
        let client = connect(&session.config)?;

        let mut always = AlwaysReplace;
        let mut prompt = PromptResolver;
        let resolver: &mut dyn ConflictResolver = if self.no_confirm_replace {
            &mut always
        } else {
            &mut prompt
        };
        let report = PushReconciler::new(&client, &session.renderer, policy)
            .push(&jobs, resolver)
            .context("push failed")?;

        for finding in &report.drift {
            println!(
                "{}",
                format!("Job '{}' was modified on the server:", finding.job)
                    .red()
                    .bold()
            );
            print_diff(&finding.diff);
        }
        if !report.drift.is_empty() {
            println!(
                "{}",
                "Use --allow-overwrite to push these jobs anyway.".yellow()
            );
        }

        for (job, outcome) in &report.outcomes {
            match outcome {
                PushOutcome::RenderFailed { reason } => {
                    println!("{} {}", format!("'{job}' not rendered:").red(), reason);
                }
                PushOutcome::TypeMismatch { expected, actual } => {
                    println!(
                        "{}",
                        format!("'{job}' is a {expected} job on the server, not {actual}.").red()
                    );
                }
                _ => {}
            }
        }

        let pushed = report.pushed();
        let not_pushed = report.not_pushed();
        print_jobs_list("Jobs not pushed:", &not_pushed, Color::Yellow);
        print_jobs_list("Pushed jobs:", &pushed, Color::Green);

        let mut ok = not_pushed.is_empty();
        if self.build && !pushed.is_empty() {
            println!();
            ok &= run_builds(&client, &pushed, &parameters, &self.wait)?;
        }
        Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    }
}

/// Asks on the terminal before replacing a job.
struct PromptResolver;

impl ConflictResolver for PromptResolver {
    fn resolve(&mut self, conflict: &TypeConflict) -> ConflictDecision {
        println!(
            "{}",
            format!(
                "Job '{}' is a {} job on the server but the repository defines a {} job.",
                conflict.job, conflict.expected, conflict.actual
            )
            .red()
        );
        print!("Delete it, losing its build history, and push again? [y/N] ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => {
                ConflictDecision::Replace
            }
            _ => ConflictDecision::Abort,
        }
    }
}

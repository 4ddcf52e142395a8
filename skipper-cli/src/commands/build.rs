//! `skipper build`: trigger builds and optionally wait for their results.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use skipper_remote::{BuildStatus, JenkinsClient, Outcome};
use skipper_sync::{
    build::describe_result, BuildOrchestrator, BuildOutcome, LogPolicy, PollPolicy, ResultNode,
    ThreadScheduler,
};

use super::{connect, ParameterArgs, RepoArgs, Session};

/// Options shared by `skipper build` and `skipper push --build`.
#[derive(Args, Debug, Clone, Default)]
pub struct WaitArgs {
    /// Wait for the builds to finish and print their results.
    #[arg(long)]
    pub block: bool,

    /// Stop waiting after SECS seconds (with --block).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the console log of every finished build, not only failures.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for `skipper build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Jobs to build (default: every job in the repository).
    pub jobs: Vec<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub parameters: ParameterArgs,

    #[command(flatten)]
    pub wait: WaitArgs,
}

impl BuildArgs {
    pub fn run(self) -> Result<ExitCode> {
        let parameters = self.parameters.parse()?;
        let session = Session::open(&self.repo.dir, Default::default())?;
        let jobs = session.select(&self.jobs)?;
        let client = connect(&session.config)?;
        let ok = run_builds(&client, &jobs, &parameters, &self.wait)?;
        Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    }
}

/// Trigger `jobs` and, with `--block`, wait for them and print the results.
///
/// Returns false when any waited-for build did not succeed.
pub fn run_builds(
    client: &JenkinsClient,
    jobs: &[String],
    parameters: &[(String, String)],
    wait: &WaitArgs,
) -> Result<bool> {
    if jobs.is_empty() {
        println!("No jobs to build.");
        return Ok(true);
    }

    let policy = PollPolicy::default().with_max_wait(wait.timeout.map(Duration::from_secs));
    let orchestrator = BuildOrchestrator::new(client, policy);
    let triggered = orchestrator
        .trigger(jobs, parameters)
        .context("failed to trigger builds")?;

    if !wait.block {
        println!("{}", "Triggered builds:".bold());
        for t in &triggered {
            println!("  {} {}", t.job, t.handle.to_string().bright_black());
        }
        return Ok(true);
    }

    let builds = orchestrator
        .wait(triggered, &mut ThreadScheduler::new())
        .context("failed while waiting for builds")?;
    let logs = if wait.verbose {
        LogPolicy::Always
    } else {
        LogPolicy::FailuresOnly
    };

    let mut all_succeeded = true;
    for build in &builds {
        all_succeeded &= build.outcome.is_success();
        match &build.outcome {
            BuildOutcome::Finished(result) => {
                let node = describe_result(client, &build.job, result, logs)
                    .with_context(|| format!("failed to fetch results of '{}'", build.job))?;
                print_node(&node, 0);
            }
            BuildOutcome::Unknown => {
                println!("{}: {}", build.job.bold(), "unknown status".yellow());
            }
            BuildOutcome::TimedOut { last_location } => {
                let location = last_location
                    .as_ref()
                    .map(|l| format!(" ({l})"))
                    .unwrap_or_default();
                println!("{}: {}{}", build.job.bold(), "timed out".yellow(), location);
            }
        }
    }

    Ok(all_succeeded)
}

fn print_node(node: &ResultNode, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{}: {} {}",
        node.name.bold(),
        colored_status(node),
        node.location.to_string().bright_black()
    );
    if let Some(log) = &node.log {
        let separator = "-".repeat(72).bright_black().to_string();
        println!("{separator}");
        print!("{log}");
        if !log.ends_with('\n') {
            println!();
        }
        println!("{separator}");
    }
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn colored_status(node: &ResultNode) -> String {
    let label = node.status_label();
    match node.status {
        BuildStatus::Pending => label.cyan().to_string(),
        BuildStatus::Terminal(Outcome::Success) => label.green().to_string(),
        BuildStatus::Terminal(Outcome::Unstable) => label.yellow().to_string(),
        BuildStatus::Terminal(_) => label.red().bold().to_string(),
    }
}

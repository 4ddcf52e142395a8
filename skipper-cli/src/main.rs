//! Skipper: keep CI server jobs in sync with a job repository.
//!
//! # Usage
//!
//! ```text
//! skipper push [JOBS..] [-d DIR] [--force] [--allow-overwrite] [-b] [--block]
//!              [--no-confirm-replace] [-c VAR=VALUE].. [-p NAME=VALUE]..
//! skipper build [JOBS..] [-d DIR] [--block] [-p NAME=VALUE].. [--timeout SECS] [-v]
//! skipper diff [JOBS..] [-d DIR] [-c VAR=VALUE]..
//! skipper status [JOBS..] [-d DIR] [--json]
//! skipper render JOB [-d DIR] [-c VAR=VALUE]..
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    build::BuildArgs, diff::DiffArgs, push::PushArgs, render::RenderArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "skipper",
    version,
    about = "Synchronize CI server jobs with a declarative job repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push jobs to the server.
    Push(PushArgs),

    /// Trigger builds of jobs.
    Build(BuildArgs),

    /// Show differences between jobs on the server and in the repository.
    Diff(DiffArgs),

    /// Show the synchronization status of jobs.
    Status(StatusArgs),

    /// Print the configuration a push would send for a job.
    Render(RenderArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    tracing::debug!("running {:?}", cli.command);
    match cli.command {
        Commands::Push(args) => args.run(),
        Commands::Build(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Render(args) => args.run(),
    }
}

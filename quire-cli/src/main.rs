//! Quire: render one parameterized report template across many bindings.
//!
//! # Usage
//!
//! ```text
//! quire run <config> [--format F]... [--concurrency N] [--timeout-secs S]
//!           [--output-root DIR] [--param K=V]... [--retry-failed[=SUMMARY]]
//!           [--json] [--no-summary]
//! quire plan <config> [overrides] [--json]
//! quire report <summary.json> [--json] [--failed]
//! quire init [<dir>] [--force]
//! ```
//!
//! Exit codes: `0` every job rendered, `1` fatal error (nothing ran),
//! `2` some or all jobs failed, `130` cancelled with skipped jobs.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, plan::PlanArgs, report::ReportArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "quire",
    version,
    about = "Render a parameterized report template for every binding of its dimensions",
    long_about = None,
)]
struct Cli {
    /// Log as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every job described by a run configuration.
    Run(RunArgs),

    /// Enumerate jobs and check output paths without rendering anything.
    Plan(PlanArgs),

    /// Print a saved run summary.
    Report(ReportArgs),

    /// Write a starter quire.yaml.
    Init(InitArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Plan(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::Report(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::Init(args) => args.run().map(|()| ExitCode::SUCCESS),
    }
}

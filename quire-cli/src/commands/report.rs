//! `quire report`: print a saved run summary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use quire_runner::{summary, JobStatus, OverallStatus, RenderOutcome, RunSummary};

/// Arguments for `quire report`.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Summary file written by `quire run`.
    #[arg(value_name = "SUMMARY", default_value = "output/quire-summary.json")]
    pub summary: PathBuf,

    /// Emit the summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Only list jobs that did not render.
    #[arg(long)]
    pub failed: bool,
}

impl ReportArgs {
    pub fn run(self) -> Result<()> {
        let loaded = summary::load_at(&self.summary)
            .with_context(|| format!("failed to read summary '{}'", self.summary.display()))?;
        if self.json {
            return print_json(&loaded);
        }
        print_summary(&loaded, self.failed);
        Ok(())
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "binding")]
    binding: String,
    #[tabled(rename = "format")]
    format: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "time")]
    time: String,
    #[tabled(rename = "output / error")]
    detail: String,
}

pub fn print_json(summary: &RunSummary) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(summary).context("failed to serialize summary JSON")?
    );
    Ok(())
}

pub fn print_summary(summary: &RunSummary, failed_only: bool) {
    let counts = &summary.counts;
    println!(
        "Quire v{} | {} | {} | {} jobs | {} ok | {} failed | {} skipped | {}",
        env!("CARGO_PKG_VERSION"),
        summary.template,
        overall_label(summary.overall),
        counts.total,
        counts.succeeded.to_string().green(),
        counts.failed.to_string().red(),
        counts.skipped.to_string().bright_black(),
        format_elapsed(summary.elapsed.as_millis()),
    );

    let selected: Vec<(usize, &RenderOutcome)> = if failed_only {
        summary.unfinished().collect()
    } else {
        summary.outcomes.iter().enumerate().collect()
    };
    let rows: Vec<OutcomeRow> = selected
        .into_iter()
        .map(|(i, o)| outcome_row(i + 1, o, &summary.output_root))
        .collect();

    if rows.is_empty() {
        if failed_only {
            println!("No failed jobs.");
        } else {
            println!("No jobs in this run.");
        }
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if summary.cancelled {
        println!("Run was cancelled; skipped jobs were never started.");
    }
    if counts.failed + counts.skipped > 0 {
        println!("Run 'quire run <config> --retry-failed' to render only the unfinished jobs.");
    }
}

fn outcome_row(index: usize, outcome: &RenderOutcome, root: &Path) -> OutcomeRow {
    let detail = match (outcome.artifact(), outcome.error()) {
        (Some(artifact), _) => display_under(root, &artifact.path),
        (None, Some(error)) => error.to_string(),
        (None, None) => "not started".to_string(),
    };
    OutcomeRow {
        index,
        binding: outcome.job.binding.to_string(),
        format: outcome.job.format.to_string(),
        status: status_label(outcome.status()).to_string(),
        time: format_elapsed(outcome.elapsed.as_millis()),
        detail,
    }
}

fn display_under(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Success => "OK",
        JobStatus::Failed => "FAILED",
        JobStatus::Skipped => "SKIPPED",
    }
}

fn overall_label(overall: OverallStatus) -> String {
    match overall {
        OverallStatus::Success => "SUCCESS".green().bold().to_string(),
        OverallStatus::PartialSuccess => "PARTIAL".yellow().bold().to_string(),
        OverallStatus::Failed => "FAILED".red().bold().to_string(),
    }
}

fn format_elapsed(ms: u128) -> String {
    if ms < 1_000 {
        format!("{ms} ms")
    } else {
        format!("{:.1} s", ms as f64 / 1_000.0)
    }
}

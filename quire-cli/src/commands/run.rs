//! `quire run`: render every job of a run configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use quire_renderer::CommandEngine;
use quire_runner::{summary, RunCoordinator, RunScope, RunSummary};

use super::{report, ConfigArgs};

/// Exit code when the run was interrupted and some jobs never started.
const EXIT_CANCELLED: u8 = 130;
/// Exit code when at least one job failed or was skipped.
const EXIT_INCOMPLETE: u8 = 2;

/// Arguments for `quire run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Render only jobs that did not succeed in a previous run. Reads
    /// `<output_root>/quire-summary.json` unless `--retry-failed=PATH` is given.
    #[arg(long, value_name = "SUMMARY", require_equals = true)]
    pub retry_failed: Option<Option<PathBuf>>,

    /// Print the summary as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Do not write `quire-summary.json` after the run.
    #[arg(long)]
    pub no_summary: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<ExitCode> {
        let config = self.config.load()?;
        let engine = CommandEngine::from_config(&config.engine)
            .context("invalid engine configuration")?;
        tracing::info!("engine: {}", engine.program());

        let scope = match &self.retry_failed {
            None => RunScope::All,
            Some(path) => {
                let path = path
                    .clone()
                    .unwrap_or_else(|| summary::default_path(&config.output_root));
                let previous = summary::load_at(&path).with_context(|| {
                    format!("failed to read previous summary '{}'", path.display())
                })?;
                RunScope::retry_failed(previous)
            }
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let coordinator = RunCoordinator::new(Arc::new(engine));
        let result = runtime.block_on(async {
            let cancel = coordinator.cancellation_token();
            let signal_handle = tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::warn!("received ctrl-c, skipping jobs not yet started");
                        cancel.cancel();
                    }
                    Err(err) => tracing::warn!("ctrl-c handler failed: {err}"),
                }
            });
            let result = coordinator.run_scoped(&config, &scope).await;
            signal_handle.abort();
            result
        });
        let run_summary = result.context("run aborted before rendering")?;

        if !self.no_summary {
            let path = summary::default_path(&config.output_root);
            summary::save_at(&path, &run_summary)
                .with_context(|| format!("failed to write summary '{}'", path.display()))?;
            tracing::info!("summary written to {}", path.display());
        }

        if self.json {
            report::print_json(&run_summary)?;
        } else {
            report::print_summary(&run_summary, false);
        }
        Ok(exit_code(&run_summary))
    }
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.is_success() {
        ExitCode::SUCCESS
    } else if summary.cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    }
}

//! `quire plan`: enumerate jobs and check output paths without rendering.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use quire_core::OutputFormat;
use quire_renderer::CommandEngine;
use quire_runner::{RunCoordinator, RunScope};

use super::ConfigArgs;

/// Arguments for `quire plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PlanJson {
    template: String,
    output_root: PathBuf,
    jobs: Vec<PlannedJobJson>,
}

#[derive(Serialize)]
struct PlannedJobJson {
    binding: quire_core::Binding,
    format: OutputFormat,
    output_path: PathBuf,
}

#[derive(Tabled)]
struct PlanTableRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "binding")]
    binding: String,
    #[tabled(rename = "format")]
    format: String,
    #[tabled(rename = "output")]
    output: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        CommandEngine::from_config(&config.engine).context("invalid engine configuration")?;
        let plan = RunCoordinator::plan(&config, &RunScope::All).context("planning failed")?;

        if self.json {
            let payload = PlanJson {
                template: plan.template.to_string(),
                output_root: plan.output_root.clone(),
                jobs: plan
                    .pending()
                    .map(|job| PlannedJobJson {
                        binding: job.binding.clone(),
                        format: job.format,
                        output_path: job.output_path.clone(),
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        println!(
            "{} job(s) | template {} | output root {} | concurrency {}",
            plan.planned(),
            plan.template,
            plan.output_root.display(),
            config.concurrency
        );
        let rows: Vec<PlanTableRow> = plan
            .pending()
            .enumerate()
            .map(|(i, job)| PlanTableRow {
                index: i + 1,
                binding: job.binding.to_string(),
                format: job.format.to_string(),
                output: job.relative_path.display().to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

//! Run summary: the aggregate result of one run, plus JSON persistence.
//!
//! Saved at `<output_root>/quire-summary.json` by default. Writes use the
//! `.tmp` + rename pattern so a crash never leaves half a summary behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quire_core::{Binding, OutputFormat, TemplateRef};

use crate::error::{io_err, RunError};
use crate::outcome::{duration_ms, JobError, JobStatus, RenderOutcome};

pub const SUMMARY_FILE: &str = "quire-summary.json";

/// Run-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every job rendered.
    Success,
    /// Some jobs rendered, some failed or were skipped.
    PartialSuccess,
    /// No job rendered.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A failed job, flattened for quick reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub binding: Binding,
    pub format: OutputFormat,
    pub output_path: PathBuf,
    pub error: JobError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub template: TemplateRef,
    /// Fixed parameters passed to every job.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub output_root: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    pub overall: OverallStatus,
    /// Set when the run was cancelled before every job started.
    pub cancelled: bool,
    pub counts: RunCounts,
    pub failures: Vec<FailedJob>,
    /// One entry per job, in binding-set order.
    pub outcomes: Vec<RenderOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(
        template: TemplateRef,
        params: BTreeMap<String, String>,
        output_root: PathBuf,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        outcomes: Vec<RenderOutcome>,
    ) -> Self {
        let mut counts = RunCounts {
            total: outcomes.len(),
            ..RunCounts::default()
        };
        let mut failures = Vec::new();
        for outcome in &outcomes {
            match outcome.status() {
                JobStatus::Success => counts.succeeded += 1,
                JobStatus::Skipped => counts.skipped += 1,
                JobStatus::Failed => counts.failed += 1,
            }
            if let Some(error) = outcome.error() {
                failures.push(FailedJob {
                    binding: outcome.job.binding.clone(),
                    format: outcome.job.format,
                    output_path: outcome.job.output_path.clone(),
                    error: error.clone(),
                });
            }
        }

        let overall = if counts.succeeded == counts.total {
            OverallStatus::Success
        } else if counts.succeeded > 0 {
            OverallStatus::PartialSuccess
        } else {
            OverallStatus::Failed
        };

        Self {
            template,
            params,
            output_root,
            started_at,
            elapsed,
            overall,
            cancelled: counts.skipped > 0,
            counts,
            failures,
            outcomes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.overall == OverallStatus::Success
    }

    /// Outcomes that did not produce an artifact (failed or skipped), with
    /// their position in the run.
    pub fn unfinished(&self) -> impl Iterator<Item = (usize, &RenderOutcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.status() != JobStatus::Success)
    }
}

/// `<output_root>/quire-summary.json`.
pub fn default_path(output_root: &Path) -> PathBuf {
    output_root.join(SUMMARY_FILE)
}

/// Save atomically: write `<path>.tmp`, then rename.
pub fn save_at(path: &Path, summary: &RunSummary) -> Result<(), RunError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let json = serde_json::to_string_pretty(summary)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

pub fn load_at(path: &Path) -> Result<RunSummary, RunError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use quire_core::{OutputLayout, TemplateRef};
    use tempfile::TempDir;

    use super::*;
    use crate::job::JobBuilder;
    use crate::outcome::ArtifactRef;

    fn outcome(unit: &str, status: JobStatus) -> RenderOutcome {
        let job = JobBuilder::new(TemplateRef::from("t.qmd"), OutputLayout::new("/out"))
            .build(&Binding::from_pairs([("unit", unit)]), OutputFormat::Pdf)
            .unwrap();
        match status {
            JobStatus::Success => {
                let artifact = ArtifactRef {
                    path: job.output_path.clone(),
                    bytes: 1,
                    sha256: "00".repeat(32),
                };
                RenderOutcome::from_result(job, Ok(artifact), Duration::from_millis(3))
            }
            JobStatus::Failed => {
                RenderOutcome::failed(job, JobError::render("boom"), Duration::from_millis(3))
            }
            JobStatus::Skipped => RenderOutcome::skipped(job),
        }
    }

    fn summary(outcomes: Vec<RenderOutcome>) -> RunSummary {
        RunSummary::from_outcomes(
            TemplateRef::from("t.qmd"),
            BTreeMap::new(),
            PathBuf::from("/out"),
            Utc::now(),
            Duration::from_millis(10),
            outcomes,
        )
    }

    #[test]
    fn all_success_is_success() {
        let s = summary(vec![outcome("A", JobStatus::Success), outcome("B", JobStatus::Success)]);
        assert_eq!(s.overall, OverallStatus::Success);
        assert!(s.failures.is_empty());
        assert!(!s.cancelled);
    }

    #[test]
    fn mixed_is_partial_success_listing_failures() {
        let s = summary(vec![outcome("A", JobStatus::Success), outcome("B", JobStatus::Failed)]);
        assert_eq!(s.overall, OverallStatus::PartialSuccess);
        assert_eq!(
            s.counts,
            RunCounts {
                total: 2,
                succeeded: 1,
                failed: 1,
                skipped: 0
            }
        );
        assert_eq!(s.failures.len(), 1);
        assert_eq!(s.failures[0].binding.get("unit"), Some("B"));
    }

    #[test]
    fn nothing_rendered_is_failed() {
        let s = summary(vec![outcome("A", JobStatus::Failed), outcome("B", JobStatus::Skipped)]);
        assert_eq!(s.overall, OverallStatus::Failed);
        assert!(s.cancelled);
        let positions: Vec<usize> = s.unfinished().map(|(i, _)| i).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn skipped_jobs_prevent_success() {
        let s = summary(vec![outcome("A", JobStatus::Success), outcome("B", JobStatus::Skipped)]);
        assert_eq!(s.overall, OverallStatus::PartialSuccess);
        assert!(s.failures.is_empty(), "skipped jobs are not failures");
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = default_path(tmp.path());
        let s = summary(vec![outcome("A", JobStatus::Success), outcome("B", JobStatus::Failed)]);

        save_at(&path, &s).unwrap();
        let loaded = load_at(&path).unwrap();
        assert_eq!(loaded.counts, s.counts);
        assert_eq!(loaded.overall, s.overall);
        assert_eq!(loaded.outcomes.len(), 2);
        assert_eq!(loaded.outcomes[1].error(), Some(&JobError::render("boom")));
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_at(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, RunError::Io { .. }));
    }
}

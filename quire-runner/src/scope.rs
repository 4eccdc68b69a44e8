//! Which jobs of a plan a run actually dispatches.

use std::collections::{BTreeMap, HashMap};

use quire_core::{Binding, OutputFormat, TemplateRef};

use crate::error::RunError;
use crate::job::RenderJob;
use crate::outcome::RenderOutcome;
use crate::summary::RunSummary;

/// Scope for a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunScope {
    /// Render every job in the binding set.
    #[default]
    All,
    /// Render only jobs that did not succeed in a previous run. Successes
    /// whose artifact is still on disk are carried over unchanged; jobs absent
    /// from that run (new bindings or formats) are rendered.
    RetryFailed(Box<RunSummary>),
}

impl RunScope {
    pub fn retry_failed(previous: RunSummary) -> Self {
        RunScope::RetryFailed(Box::new(previous))
    }

    /// A previous run only vouches for its artifacts if it rendered the same
    /// template with the same fixed parameters.
    pub fn check(
        &self,
        template: &TemplateRef,
        params: &BTreeMap<String, String>,
    ) -> Result<(), RunError> {
        let RunScope::RetryFailed(previous) = self else {
            return Ok(());
        };
        if &previous.template != template {
            return Err(RunError::SummaryMismatch {
                field: "template",
                previous: previous.template.to_string(),
                current: template.to_string(),
            });
        }
        if &previous.params != params {
            return Err(RunError::SummaryMismatch {
                field: "params",
                previous: params_label(&previous.params),
                current: params_label(params),
            });
        }
        Ok(())
    }

    /// Pair every job with the outcome it keeps from a previous run, if any.
    /// Jobs paired with `None` are the ones to dispatch.
    pub fn carry(&self, jobs: Vec<RenderJob>) -> Vec<(RenderJob, Option<RenderOutcome>)> {
        let previous = match self {
            RunScope::All => return jobs.into_iter().map(|job| (job, None)).collect(),
            RunScope::RetryFailed(previous) => previous,
        };

        let done: HashMap<(&Binding, OutputFormat), &RenderOutcome> = previous
            .outcomes
            .iter()
            .filter(|o| o.artifact().is_some_and(|a| a.path.is_file()))
            .map(|o| ((&o.job.binding, o.job.format), o))
            .collect();

        jobs.into_iter()
            .map(|job| {
                let kept = done
                    .get(&(&job.binding, job.format))
                    .filter(|o| o.job.output_path == job.output_path)
                    .map(|o| RenderOutcome {
                        job: job.clone(),
                        result: o.result.clone(),
                        elapsed: o.elapsed,
                    });
                (job, kept)
            })
            .collect()
    }
}

fn params_label(params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return "(none)".to_string();
    }
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

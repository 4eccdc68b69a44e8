//! Run coordinator: enumerates, dispatches with bounded concurrency, collects.
//!
//! A run moves through [`RunPhase`]s. Everything fatal happens while
//! enumerating, before the first job is handed to the engine. After that the
//! run always completes, with per-job failures recorded as outcomes.
//!
//! Workers are tokio tasks in a `JoinSet`, each holding a semaphore permit
//! while it renders. Each render runs in its own nested task so a panicking
//! engine turns into a `Failed` outcome for that job only. Outcomes are written
//! into index slots, so the summary keeps binding-set order whatever order the
//! jobs finish in.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use quire_core::layout::partial_path;
use quire_core::{CollisionGuard, OutputLayout, RunConfig, TemplateRef};
use quire_renderer::RenderEngine;

use crate::error::RunError;
use crate::events::{RunEvent, RunObserver, RunPhase, TracingObserver};
use crate::invoker::{discard, RenderInvoker};
use crate::job::{JobBuilder, RenderJob};
use crate::outcome::{JobError, RenderOutcome};
use crate::scope::RunScope;
use crate::summary::RunSummary;

/// Result of the enumerating phase.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub template: TemplateRef,
    pub output_root: PathBuf,
    /// Every job of the binding set in order (bindings outer, formats inner),
    /// paired with the outcome it keeps from a previous run. Jobs paired with
    /// `None` are dispatched.
    pub entries: Vec<(RenderJob, Option<RenderOutcome>)>,
}

impl RunPlan {
    /// Jobs in the full binding set.
    pub fn planned(&self) -> usize {
        self.entries.len()
    }

    /// Jobs to dispatch, in order.
    pub fn pending(&self) -> impl Iterator<Item = &RenderJob> {
        self.entries
            .iter()
            .filter(|(_, kept)| kept.is_none())
            .map(|(job, _)| job)
    }

    pub fn pending_len(&self) -> usize {
        self.pending().count()
    }
}

/// Records the current phase and reports every transition.
struct PhaseTracker<'a> {
    current: RunPhase,
    observer: &'a dyn RunObserver,
}

impl<'a> PhaseTracker<'a> {
    fn new(observer: &'a dyn RunObserver) -> Self {
        Self {
            current: RunPhase::Idle,
            observer,
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal phase transition {} -> {}",
            self.current,
            next
        );
        self.current = next;
        self.observer.on_event(&RunEvent::Phase(next));
    }
}

pub struct RunCoordinator {
    engine: Arc<dyn RenderEngine>,
    observer: Arc<dyn RunObserver>,
    cancel: CancellationToken,
}

impl RunCoordinator {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            engine,
            observer: Arc::new(TracingObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancelling this token stops dispatch; jobs not yet started are skipped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validate, enumerate, build jobs and check for path collisions.
    ///
    /// Collisions are checked over the full binding set, then `scope` decides
    /// which jobs to dispatch. Writes no files.
    pub fn plan(config: &RunConfig, scope: &RunScope) -> Result<RunPlan, RunError> {
        config.validate()?;
        scope.check(&config.template, config.space.fixed())?;
        let bindings = config.space.enumerate()?;
        let builder = JobBuilder::new(
            config.template.clone(),
            OutputLayout::new(&config.output_root),
        );

        let mut guard = CollisionGuard::new();
        let mut jobs = Vec::with_capacity(bindings.len() * config.formats.len());
        for binding in &bindings {
            for &format in &config.formats {
                let job = builder.build(binding, format)?;
                guard.claim(&job.relative_path, &job.binding, format)?;
                jobs.push(job);
            }
        }

        Ok(RunPlan {
            template: config.template.clone(),
            output_root: config.output_root.clone(),
            entries: scope.carry(jobs),
        })
    }

    pub async fn run(&self, config: &RunConfig) -> Result<RunSummary, RunError> {
        self.run_scoped(config, &RunScope::All).await
    }

    pub async fn run_scoped(
        &self,
        config: &RunConfig,
        scope: &RunScope,
    ) -> Result<RunSummary, RunError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut phase = PhaseTracker::new(self.observer.as_ref());

        phase.advance(RunPhase::Enumerating);
        let plan = match Self::plan(config, scope) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!("run aborted before dispatch: {err}");
                phase.advance(RunPhase::Aborted);
                return Err(err);
            }
        };
        tracing::info!(
            "dispatching {} of {} job(s), concurrency {}, timeout {}s",
            plan.pending_len(),
            plan.planned(),
            config.concurrency,
            config.timeout.as_secs()
        );

        let invoker = RenderInvoker::new(Arc::clone(&self.engine), config.timeout);
        let pending: Vec<RenderJob> = plan.pending().cloned().collect();
        let mut fresh = self
            .execute(pending, invoker, config.concurrency, &mut phase)
            .await
            .into_iter();
        let outcomes: Vec<RenderOutcome> = plan
            .entries
            .into_iter()
            .filter_map(|(_, kept)| kept.or_else(|| fresh.next()))
            .collect();
        phase.advance(RunPhase::Completed);

        let summary = RunSummary::from_outcomes(
            plan.template,
            config.space.fixed().clone(),
            plan.output_root,
            started_at,
            started.elapsed(),
            outcomes,
        );
        tracing::info!(
            "run {:?}: {} succeeded, {} failed, {} skipped in {} ms",
            summary.overall,
            summary.counts.succeeded,
            summary.counts.failed,
            summary.counts.skipped,
            summary.elapsed.as_millis()
        );
        Ok(summary)
    }

    async fn execute(
        &self,
        jobs: Vec<RenderJob>,
        invoker: RenderInvoker,
        concurrency: usize,
        phase: &mut PhaseTracker<'_>,
    ) -> Vec<RenderOutcome> {
        phase.advance(RunPhase::Dispatching);

        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let slots: Arc<Mutex<Vec<Option<RenderOutcome>>>> =
            Arc::new(Mutex::new(vec![None; total]));
        let mut set = JoinSet::new();

        for (index, job) in jobs.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let observer = Arc::clone(&self.observer);
            let invoker = invoker.clone();
            let slots = Arc::clone(&slots);

            set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let outcome = match permit {
                    Some(permit) => {
                        observer.on_event(&RunEvent::JobStarted {
                            index,
                            total,
                            job: &job,
                        });
                        let outcome = run_isolated(invoker, job).await;
                        drop(permit);
                        observer.on_event(&RunEvent::JobFinished {
                            index,
                            total,
                            outcome: &outcome,
                        });
                        outcome
                    }
                    None => {
                        observer.on_event(&RunEvent::JobSkipped {
                            index,
                            total,
                            job: &job,
                        });
                        RenderOutcome::skipped(job)
                    }
                };
                if let Ok(mut slots) = slots.lock() {
                    slots[index] = Some(outcome);
                }
            });
        }

        phase.advance(RunPhase::Collecting);
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("worker task ended abnormally: {e}");
            }
        }

        let filled = match slots.lock() {
            Ok(mut slots) => std::mem::take(&mut *slots),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        filled
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    RenderOutcome::failed(
                        job,
                        JobError::render("worker task ended without an outcome"),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }
}

/// Invoke in a nested task so a panic inside the engine is contained. The
/// invoker never got to clean up in that case, so the partial file goes here.
async fn run_isolated(invoker: RenderInvoker, job: RenderJob) -> RenderOutcome {
    let fallback = job.clone();
    let started = Instant::now();
    match tokio::spawn(async move { invoker.invoke(job).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = if e.is_panic() {
                "render task panicked".to_string()
            } else {
                format!("render task failed: {e}")
            };
            tracing::error!("{}: {message}", fallback.label());
            discard(&partial_path(&fallback.output_path)).await;
            RenderOutcome::failed(fallback, JobError::render(message), started.elapsed())
        }
    }
}

#[cfg(test)]
mod tests {
    use quire_core::{BindingDimension, BindingSpace};
    use quire_renderer::StubEngine;
    use tempfile::TempDir;

    use super::*;
    use crate::outcome::JobStatus;

    fn config(root: &std::path::Path) -> RunConfig {
        let space = BindingSpace::product(vec![
            BindingDimension::new("unit", ["A", "B"]),
            BindingDimension::new("period", ["2023", "2024"]),
        ]);
        let mut config = RunConfig::new(TemplateRef::from("unit.qmd"), space);
        config.output_root = root.to_path_buf();
        config
    }

    #[test]
    fn plan_orders_bindings_outer_formats_inner() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(tmp.path());
        config.set_formats([quire_core::OutputFormat::Pdf, quire_core::OutputFormat::Html]);

        let plan = RunCoordinator::plan(&config, &RunScope::All).unwrap();
        let labels: Vec<String> = plan.pending().take(3).map(|j| j.label()).collect();
        assert_eq!(
            labels,
            vec![
                "unit=A, period=2023 [pdf]",
                "unit=A, period=2023 [html]",
                "unit=A, period=2024 [pdf]",
            ]
        );
        assert_eq!(plan.planned(), 8);
        assert_eq!(plan.pending_len(), 8);
        assert!(!tmp.path().join("a").exists(), "plan writes nothing");
    }

    #[tokio::test]
    async fn engine_panic_is_contained_to_one_job() {
        struct PanicsOnB;

        #[async_trait::async_trait]
        impl RenderEngine for PanicsOnB {
            async fn render(
                &self,
                request: &quire_renderer::RenderRequest,
            ) -> Result<quire_renderer::Artifact, quire_renderer::EngineError> {
                if request.params.get("unit").map(String::as_str) == Some("B") {
                    std::fs::write(&request.destination, "half").unwrap();
                    panic!("engine bug");
                }
                StubEngine::new().render(request).await
            }
        }

        let tmp = TempDir::new().unwrap();
        let summary = RunCoordinator::new(Arc::new(PanicsOnB))
            .run(&config(tmp.path()))
            .await
            .unwrap();

        let statuses: Vec<JobStatus> = summary.outcomes.iter().map(|o| o.status()).collect();
        assert_eq!(
            statuses,
            vec![
                JobStatus::Success,
                JobStatus::Success,
                JobStatus::Failed,
                JobStatus::Failed
            ]
        );
        assert_eq!(
            summary.outcomes[2].error(),
            Some(&JobError::render("render task panicked"))
        );
        let partial = partial_path(&summary.outcomes[2].job.output_path);
        assert!(partial.parent().unwrap().is_dir());
        assert!(!partial.exists(), "partial file of the panicked job is removed");
    }
}

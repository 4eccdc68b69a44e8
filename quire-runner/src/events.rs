//! Run lifecycle phases and the progress event stream.

use std::fmt;

use crate::job::RenderJob;
use crate::outcome::{JobStatus, RenderOutcome};

/// Coordinator state machine.
///
/// ```text
/// Idle → Enumerating → Dispatching → Collecting → Completed
///             └──────→ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    Enumerating,
    Dispatching,
    Collecting,
    Completed,
    Aborted,
}

impl RunPhase {
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (RunPhase::Idle, RunPhase::Enumerating)
                | (RunPhase::Enumerating, RunPhase::Dispatching)
                | (RunPhase::Enumerating, RunPhase::Aborted)
                | (RunPhase::Dispatching, RunPhase::Collecting)
                | (RunPhase::Collecting, RunPhase::Completed)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Enumerating => "enumerating",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Collecting => "collecting",
            RunPhase::Completed => "completed",
            RunPhase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Progress notifications. `index` is the job's position in result order.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    Phase(RunPhase),
    JobStarted {
        index: usize,
        total: usize,
        job: &'a RenderJob,
    },
    JobFinished {
        index: usize,
        total: usize,
        outcome: &'a RenderOutcome,
    },
    JobSkipped {
        index: usize,
        total: usize,
        job: &'a RenderJob,
    },
}

/// Receives events from worker tasks; must not block.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent<'_>);
}

/// Default observer: forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_event(&self, event: &RunEvent<'_>) {
        match event {
            RunEvent::Phase(phase) => tracing::debug!(%phase, "run phase"),
            RunEvent::JobStarted { index, total, job } => {
                tracing::info!("[{}/{}] start {}", index + 1, total, job.label());
            }
            RunEvent::JobFinished {
                index,
                total,
                outcome,
            } => match outcome.status() {
                JobStatus::Success => tracing::info!(
                    "[{}/{}] done {} in {} ms",
                    index + 1,
                    total,
                    outcome.job.label(),
                    outcome.elapsed.as_millis()
                ),
                _ => tracing::warn!(
                    "[{}/{}] {} {}",
                    index + 1,
                    total,
                    outcome.status(),
                    outcome.job.label()
                ),
            },
            RunEvent::JobSkipped { index, total, job } => {
                tracing::info!("[{}/{}] skipped {} (cancelled)", index + 1, total, job.label());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        let path = [
            RunPhase::Idle,
            RunPhase::Enumerating,
            RunPhase::Dispatching,
            RunPhase::Collecting,
            RunPhase::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn abort_only_from_enumerating() {
        assert!(RunPhase::Enumerating.can_transition_to(RunPhase::Aborted));
        assert!(!RunPhase::Dispatching.can_transition_to(RunPhase::Aborted));
        assert!(!RunPhase::Collecting.can_transition_to(RunPhase::Aborted));
    }
}

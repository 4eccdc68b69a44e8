//! # quire-runner
//!
//! Turns a [`RunConfig`](quire_core::RunConfig) into rendered artifacts.
//!
//! [`RunCoordinator::run`] enumerates the binding set, builds one
//! [`RenderJob`] per (binding, format), checks output paths for collisions and
//! dispatches the jobs to a [`RenderEngine`](quire_renderer::RenderEngine)
//! with bounded concurrency. Per-job failures and timeouts are recorded in the
//! returned [`RunSummary`]; only configuration and collision errors are `Err`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use quire_core::RunConfig;
//! use quire_renderer::StubEngine;
//! use quire_runner::RunCoordinator;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::load("quire.yaml".as_ref())?;
//! let summary = RunCoordinator::new(Arc::new(StubEngine::new()))
//!     .run(&config)
//!     .await?;
//! println!("{:?}: {} of {}", summary.overall, summary.counts.succeeded, summary.counts.total);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod events;
pub mod invoker;
pub mod job;
pub mod outcome;
pub mod scope;
pub mod summary;

pub use coordinator::{RunCoordinator, RunPlan};
pub use error::RunError;
pub use events::{RunEvent, RunObserver, RunPhase, TracingObserver};
pub use invoker::RenderInvoker;
pub use job::{JobBuilder, RenderJob};
pub use outcome::{ArtifactRef, JobError, JobResult, JobStatus, RenderOutcome};
pub use scope::RunScope;
pub use summary::{FailedJob, OverallStatus, RunCounts, RunSummary};

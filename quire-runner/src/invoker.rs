//! Render invoker: runs one job against the engine with isolation.
//!
//! ## `invoke` protocol
//!
//! 1. Create the job's parent directories.
//! 2. Ask the engine to render into `.<stem>.partial.<ext>` next to the target.
//! 3. Bound the engine call by the per-job timeout; on expiry the engine future
//!    is dropped, which kills the engine and every process it started.
//! 4. On failure or timeout, remove the partial file.
//! 5. On success, rename the partial file onto the final path (atomic on POSIX).
//! 6. Hash the artifact.
//!
//! Nothing in this module returns `Err` to the caller: every failure becomes a
//! [`RenderOutcome`] with status `Failed`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

use quire_core::layout::partial_path;
use quire_renderer::{error::error_chain, RenderEngine};

use crate::job::RenderJob;
use crate::outcome::{ArtifactRef, JobError, RenderOutcome};

fn io_failure(path: &Path, err: std::io::Error) -> JobError {
    JobError::render(format!("I/O error at {}: {err}", path.display()))
}

pub(crate) async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("could not remove partial artifact {}: {e}", path.display());
        }
    }
}

async fn describe_artifact(path: &Path) -> Result<ArtifactRef, JobError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| io_failure(path, e))?;
    Ok(ArtifactRef {
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
        sha256: hex::encode(Sha256::digest(&bytes)),
    })
}

/// Executes jobs against one engine with one timeout.
#[derive(Clone)]
pub struct RenderInvoker {
    engine: Arc<dyn RenderEngine>,
    timeout: Duration,
}

impl RenderInvoker {
    pub fn new(engine: Arc<dyn RenderEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Render `job`, consuming it into its outcome.
    pub async fn invoke(&self, job: RenderJob) -> RenderOutcome {
        let started = Instant::now();
        let result = self.render(&job).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(artifact) => tracing::info!(
                "rendered {} -> {} ({} bytes, {} ms)",
                job.label(),
                artifact.path.display(),
                artifact.bytes,
                elapsed.as_millis()
            ),
            Err(err) => tracing::warn!("failed {}: {err}", job.label()),
        }
        RenderOutcome::from_result(job, result, elapsed)
    }

    async fn render(&self, job: &RenderJob) -> Result<ArtifactRef, JobError> {
        let target = &job.output_path;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(parent, e))?;
        }

        let partial = partial_path(target);
        let request = job.request(partial.clone());

        let artifact = match tokio::time::timeout(self.timeout, self.engine.render(&request)).await {
            Err(_) => {
                discard(&partial).await;
                return Err(JobError::timeout(self.timeout));
            }
            Ok(Err(err)) => {
                discard(&partial).await;
                return Err(JobError::render(error_chain(&err)));
            }
            Ok(Ok(artifact)) => artifact,
        };

        if let Err(e) = tokio::fs::rename(&artifact.path, target).await {
            discard(&artifact.path).await;
            return Err(io_failure(target, e));
        }
        describe_artifact(target).await
    }
}

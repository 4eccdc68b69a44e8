//! Per-job outcomes.
//!
//! Every job dispatched (or skipped) in a run ends up as exactly one
//! [`RenderOutcome`]. Failures are values here, never panics or `Err`s that
//! cross job boundaries.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::RenderJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why one job failed. Isolated to that job; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// The engine failed for this binding/format, or its artifact could not
    /// be moved into place.
    #[error("render error: {message}")]
    Render { message: String },

    /// The engine exceeded the per-job time budget and was stopped.
    #[error("render timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

impl JobError {
    pub fn render(message: impl Into<String>) -> Self {
        JobError::Render {
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        JobError::Timeout {
            timeout_ms: duration_ms::to_millis(after),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Timeout { .. })
    }
}

/// A written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub bytes: u64,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Success { artifact: ArtifactRef },
    Failed { error: JobError },
    Skipped,
}

/// One job plus what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutcome {
    pub job: RenderJob,
    #[serde(flatten)]
    pub result: JobResult,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
}

impl RenderOutcome {
    pub fn from_result(job: RenderJob, result: Result<ArtifactRef, JobError>, elapsed: Duration) -> Self {
        let result = match result {
            Ok(artifact) => JobResult::Success { artifact },
            Err(error) => JobResult::Failed { error },
        };
        Self { job, result, elapsed }
    }

    pub fn failed(job: RenderJob, error: JobError, elapsed: Duration) -> Self {
        Self::from_result(job, Err(error), elapsed)
    }

    pub fn skipped(job: RenderJob) -> Self {
        Self {
            job,
            result: JobResult::Skipped,
            elapsed: Duration::ZERO,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self.result {
            JobResult::Success { .. } => JobStatus::Success,
            JobResult::Failed { .. } => JobStatus::Failed,
            JobResult::Skipped => JobStatus::Skipped,
        }
    }

    pub fn artifact(&self) -> Option<&ArtifactRef> {
        match &self.result {
            JobResult::Success { artifact } => Some(artifact),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.result {
            JobResult::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// `Duration` as whole milliseconds in JSON.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn to_millis(d: Duration) -> u64 {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(to_millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

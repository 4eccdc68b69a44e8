//! Error types for quire-runner.

use std::path::PathBuf;

use thiserror::Error;

use quire_core::{ConfigError, OutputCollisionError};

/// Errors that end a run before any job is dispatched, or that occur while
/// persisting its summary. Per-job failures never appear here; they live in
/// [`JobError`](crate::outcome::JobError).
#[derive(Debug, Error)]
pub enum RunError {
    /// Malformed configuration; nothing was rendered.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Two jobs would write the same file; nothing was rendered.
    #[error(transparent)]
    Collision(#[from] OutputCollisionError),

    /// A retry was asked for against the summary of a different run.
    #[error("previous summary rendered {field} {previous}, this run uses {current}; render everything instead of retrying")]
    SummaryMismatch {
        field: &'static str,
        previous: String,
        current: String,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Summary JSON serialization/deserialization error.
    #[error("summary JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`RunError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RunError {
    RunError::Io {
        path: path.into(),
        source,
    }
}

//! Error types for quire-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one engine invocation. Always scoped to a single job.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Tera failed while expanding an argv template.
    #[error("argument template error: {0}")]
    Tera(#[from] tera::Error),

    /// The engine program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and exited unsuccessfully.
    #[error("engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    /// The engine exited cleanly but left nothing at the destination.
    #[error("engine produced no artifact at {path}")]
    MissingArtifact { path: PathBuf },

    /// The engine refused this binding (bad data, malformed template for it, ...).
    #[error("render rejected: {0}")]
    Rejected(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}

/// Flatten an error and its sources into one line; tera hides the useful part
/// of its messages in the source chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

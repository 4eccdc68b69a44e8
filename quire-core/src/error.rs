//! Error types for quire-core.

use std::path::PathBuf;

use thiserror::Error;

/// A malformed run configuration. Always detected before any job is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, including the file path and serde_yaml's line context.
    #[error("failed to parse run config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no dimensions declared")]
    NoDimensions,

    #[error("dimension '{dimension}' has no values")]
    EmptyDimension { dimension: String },

    #[error("dimension '{dimension}' declared more than once")]
    DuplicateDimension { dimension: String },

    #[error("dimension '{dimension}' lists value '{value}' more than once")]
    DuplicateValue { dimension: String, value: String },

    #[error("dimension '{dimension}' value must be a scalar, got {found}")]
    NonScalarValue { dimension: String, found: String },

    #[error("explicit binding #{index} does not assign dimension '{dimension}'")]
    MissingDimension { index: usize, dimension: String },

    #[error("explicit binding #{index} assigns dimension '{dimension}' more than once")]
    DuplicateAssignment { index: usize, dimension: String },

    #[error("explicit binding #{index} assigns undeclared dimension '{dimension}'")]
    UnknownDimension { index: usize, dimension: String },

    #[error("explicit binding #{index} uses value '{value}' not declared for dimension '{dimension}'")]
    UnknownValue {
        index: usize,
        dimension: String,
        value: String,
    },

    #[error("explicit binding #{index} repeats binding #{first}")]
    DuplicateBinding { index: usize, first: usize },

    #[error("explicit binding list is empty")]
    NoBindings,

    #[error("fixed parameter '{name}' shadows a dimension of the same name")]
    ParamShadowsDimension { name: String },

    #[error("unsupported output format '{format}'; expected one of: pdf, html, docx")]
    UnsupportedFormat { format: String },

    #[error("no output formats requested")]
    NoFormats,

    #[error("concurrency limit must be at least 1")]
    InvalidConcurrency,

    #[error("per-job timeout must be greater than zero")]
    InvalidTimeout,

    #[error("value '{value}' of dimension '{dimension}' has no filesystem-safe characters")]
    EmptySlug { dimension: String, value: String },

    /// The engine argv templates failed to compile.
    #[error("invalid engine template '{name}': {message}")]
    EngineTemplate { name: String, message: String },
}

/// Two jobs in one run would write the same output path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("output collision at {path}: [{first}] and [{second}] both render {format}")]
pub struct OutputCollisionError {
    pub path: PathBuf,
    pub format: String,
    /// Display form of the first binding, e.g. `unit=A, period=2023`.
    pub first: String,
    pub second: String,
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

//! The rendering-engine capability boundary.
//!
//! The core never looks inside a template. It hands the engine a
//! [`RenderRequest`] and receives either an [`Artifact`] or an [`EngineError`].
//! Production uses [`CommandEngine`](crate::CommandEngine); tests use
//! [`StubEngine`](crate::StubEngine).

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use quire_core::{OutputFormat, TemplateRef};

use crate::error::EngineError;

/// Everything the engine needs for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub template: TemplateRef,
    /// Dimension values overlaid on fixed parameters.
    pub params: BTreeMap<String, String>,
    pub format: OutputFormat,
    /// Where the engine must write the artifact.
    pub destination: PathBuf,
}

/// A rendered file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
}

/// Turns one template + one binding into one artifact in one format.
///
/// Implementations must be cancel-safe: dropping the returned future (on
/// timeout) must stop the underlying work.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, EngineError>;
}

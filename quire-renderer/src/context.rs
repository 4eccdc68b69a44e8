//! Argv context: the serializable payload the command engine expands its
//! argument templates against.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::RenderRequest;
use crate::error::EngineError;

/// Variables visible to `engine.args`.
///
/// `param_args` additionally see `name` and `value` for the current parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ArgContext {
    pub template: String,
    pub format: String,
    pub extension: String,
    /// Full destination path.
    pub output: String,
    pub output_dir: String,
    pub output_name: String,
    pub params: BTreeMap<String, String>,
}

impl ArgContext {
    pub fn from_request(request: &RenderRequest) -> Self {
        let destination = &request.destination;
        Self {
            template: request.template.0.clone(),
            format: request.format.to_string(),
            extension: request.format.extension().to_string(),
            output: destination.display().to_string(),
            output_dir: destination
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            output_name: destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            params: request.params.clone(),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, EngineError> {
        tera::Context::from_serialize(self).map_err(EngineError::from)
    }

    /// Context for one `param_args` expansion.
    pub fn with_param(&self, name: &str, value: &str) -> Result<tera::Context, EngineError> {
        let mut ctx = self.to_tera_context()?;
        ctx.insert("name", name);
        ctx.insert("value", value);
        Ok(ctx)
    }
}

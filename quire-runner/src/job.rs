//! Render jobs and the builder that derives their output paths.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use quire_core::{Binding, ConfigError, OutputFormat, OutputLayout, TemplateRef};
use quire_renderer::RenderRequest;

/// One (template, binding, format) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJob {
    pub template: TemplateRef,
    pub binding: Binding,
    pub format: OutputFormat,
    /// Path under the output root, e.g. `a/2023/a_2023.pdf`.
    pub relative_path: PathBuf,
    /// `<output_root>/<relative_path>`.
    pub output_path: PathBuf,
}

impl RenderJob {
    /// Engine request writing to `destination` instead of the final path.
    pub fn request(&self, destination: PathBuf) -> RenderRequest {
        RenderRequest {
            template: self.template.clone(),
            params: self.binding.params(),
            format: self.format,
            destination,
        }
    }

    /// Short label for logs: `unit=A, period=2023 [pdf]`.
    pub fn label(&self) -> String {
        format!("{} [{}]", self.binding, self.format)
    }
}

/// Turns bindings into jobs. Pure: no filesystem access.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    template: TemplateRef,
    layout: OutputLayout,
}

impl JobBuilder {
    pub fn new(template: TemplateRef, layout: OutputLayout) -> Self {
        Self { template, layout }
    }

    pub fn build(&self, binding: &Binding, format: OutputFormat) -> Result<RenderJob, ConfigError> {
        let relative_path = self.layout.relative_path(binding, format)?;
        Ok(RenderJob {
            template: self.template.clone(),
            binding: binding.clone(),
            format,
            output_path: self.layout.resolve(&relative_path),
            relative_path,
        })
    }

    /// Like [`JobBuilder::build`] for a format given by name.
    ///
    /// Fails with [`ConfigError::UnsupportedFormat`] outside the registered set.
    pub fn build_named(&self, binding: &Binding, format: &str) -> Result<RenderJob, ConfigError> {
        self.build(binding, format.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> JobBuilder {
        JobBuilder::new(TemplateRef::from("unit.qmd"), OutputLayout::new("/out"))
    }

    #[test]
    fn build_derives_both_paths() {
        let binding = Binding::from_pairs([("unit", "A"), ("period", "2023")]);
        let job = builder().build(&binding, OutputFormat::Pdf).unwrap();
        assert_eq!(job.relative_path, PathBuf::from("a/2023/a_2023.pdf"));
        assert_eq!(job.output_path, PathBuf::from("/out/a/2023/a_2023.pdf"));
        assert_eq!(job.binding, binding);
        assert_eq!(job.label(), "unit=A, period=2023 [pdf]");
    }

    #[test]
    fn build_does_not_touch_the_filesystem() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("out");
        let b = JobBuilder::new(TemplateRef::from("t"), OutputLayout::new(&root));
        b.build(&Binding::from_pairs([("unit", "A")]), OutputFormat::Html)
            .unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn unregistered_format_name_is_rejected() {
        let binding = Binding::from_pairs([("unit", "A")]);
        let err = builder().build_named(&binding, "odt").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { ref format } if format == "odt"));
        assert!(builder().build_named(&binding, "docx").is_ok());
    }

    #[test]
    fn request_carries_params_and_destination() {
        let binding = Binding::from_pairs([("unit", "A")]);
        let job = builder().build(&binding, OutputFormat::Docx).unwrap();
        let req = job.request(PathBuf::from("/tmp/partial.docx"));
        assert_eq!(req.params.get("unit").map(String::as_str), Some("A"));
        assert_eq!(req.destination, PathBuf::from("/tmp/partial.docx"));
        assert_eq!(req.format, OutputFormat::Docx);
    }
}

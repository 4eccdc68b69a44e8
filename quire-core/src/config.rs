//! YAML run configuration.
//!
//! ```yaml
//! template: reports/unit.qmd
//! output_root: output          # relative to this file
//! formats: [pdf, html]
//! concurrency: 4
//! timeout_secs: 300
//! params:                      # fixed, shared by every binding
//!   org: Acme
//! dimensions:                  # document order is enumeration order
//!   unit: [A, B]
//!   period: [2023, 2024]
//! bindings:                    # optional: explicit subset instead of the product
//!   - { unit: A, period: 2024 }
//! engine:
//!   program: quarto
//!   args: [render, "{{ template }}", --to, "{{ format }}"]
//!   param_args: ["-P", "{{ name }}:{{ value }}"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::binding::BindingSpace;
use crate::error::{io_err, ConfigError};
use crate::ordered::OrderedMap;
use crate::types::{BindingDimension, OutputFormat, TemplateRef};

pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_OUTPUT_ROOT: &str = "output";

// ---------------------------------------------------------------------------
// Engine block
// ---------------------------------------------------------------------------

/// External engine invocation. `args` and `param_args` are Tera templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Repeated once per parameter with `name` and `value` in scope.
    #[serde(default)]
    pub param_args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "quarto".to_string(),
            args: [
                "render",
                "{{ template }}",
                "--to",
                "{{ format }}",
                "--output",
                "{{ output_name }}",
                "--output-dir",
                "{{ output_dir }}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            param_args: vec!["-P".to_string(), "{{ name }}:{{ value }}".to_string()],
            env: BTreeMap::new(),
            working_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRunConfig {
    template: String,
    #[serde(default)]
    dimensions: OrderedMap<Vec<Value>>,
    #[serde(default)]
    bindings: Option<Vec<OrderedMap<Value>>>,
    #[serde(default)]
    params: OrderedMap<Value>,
    #[serde(default)]
    formats: Option<Vec<String>>,
    #[serde(default)]
    output_root: Option<PathBuf>,
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    engine: Option<EngineConfig>,
}

fn scalar(name: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::NonScalarValue {
            dimension: name.to_string(),
            found: match other {
                Value::Null => "null",
                Value::Sequence(_) => "a sequence",
                Value::Mapping(_) => "a mapping",
                _ => "a tagged value",
            }
            .to_string(),
        }),
    }
}

fn scalar_row(row: &OrderedMap<Value>) -> Result<Vec<(String, String)>, ConfigError> {
    row.iter()
        .map(|(k, v)| Ok((k.to_string(), scalar(k, v)?)))
        .collect()
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Validated description of one batch run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub template: TemplateRef,
    pub space: BindingSpace,
    pub formats: Vec<OutputFormat>,
    pub output_root: PathBuf,
    pub concurrency: usize,
    pub timeout: Duration,
    pub engine: EngineConfig,
}

impl RunConfig {
    /// Config with defaults for everything but the template and the space.
    pub fn new(template: impl Into<TemplateRef>, space: BindingSpace) -> Self {
        Self {
            template: template.into(),
            space,
            formats: vec![OutputFormat::Pdf],
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            engine: EngineConfig::default(),
        }
    }

    /// Load and validate a YAML config file.
    ///
    /// Relative `output_root` and `engine.working_dir` resolve against the
    /// file's directory; the engine runs there unless told otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let raw: RawRunConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_raw(raw, base_dir)
    }

    /// Parse YAML text, resolving relative paths against `base_dir`.
    pub fn from_yaml_str(yaml: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let raw: RawRunConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        Self::from_raw(raw, base_dir)
    }

    fn from_raw(raw: RawRunConfig, base_dir: &Path) -> Result<Self, ConfigError> {
        let dimensions = raw
            .dimensions
            .iter()
            .map(|(name, values)| {
                let values = values
                    .iter()
                    .map(|v| scalar(name, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(BindingDimension::new(name, values))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let space = match &raw.bindings {
            None => BindingSpace::product(dimensions),
            Some(rows) => BindingSpace::explicit(
                dimensions,
                rows.iter().map(scalar_row).collect::<Result<_, _>>()?,
            ),
        };
        let fixed: BTreeMap<String, String> = scalar_row(&raw.params)?.into_iter().collect();

        let formats = match raw.formats {
            Some(names) => names
                .iter()
                .map(|n| n.parse())
                .collect::<Result<Vec<OutputFormat>, _>>()?,
            None => vec![OutputFormat::Pdf],
        };

        let output_root = base_dir.join(
            raw.output_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
        );

        let mut engine = raw.engine.unwrap_or_default();
        engine.working_dir = Some(match engine.working_dir.take() {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        });

        let mut config = Self {
            template: TemplateRef(raw.template),
            space: space.with_fixed(fixed),
            formats: Vec::new(),
            output_root,
            concurrency: raw.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            timeout: Duration::from_secs(raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            engine,
        };
        config.set_formats(formats);
        config.validate()?;
        Ok(config)
    }

    /// Replace the requested formats, dropping repeats but keeping first-seen order.
    pub fn set_formats(&mut self, formats: impl IntoIterator<Item = OutputFormat>) {
        self.formats.clear();
        for format in formats {
            if !self.formats.contains(&format) {
                self.formats.push(format);
            }
        }
    }

    /// Run-level checks; binding checks happen again at enumeration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        self.space.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::EnumerationPolicy;

    const BASIC: &str = r#"
template: reports/unit.qmd
formats: [pdf, HTML, pdf]
concurrency: 3
timeout_secs: 45
params:
  org: Acme
dimensions:
  unit: [A, B]
  period: [2023, 2024]
"#;

    #[test]
    fn parses_basic_config() {
        let cfg = RunConfig::from_yaml_str(BASIC, Path::new("/work")).unwrap();
        assert_eq!(cfg.template, TemplateRef::from("reports/unit.qmd"));
        assert_eq!(cfg.formats, vec![OutputFormat::Pdf, OutputFormat::Html]);
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.timeout, Duration::from_secs(45));
        assert_eq!(cfg.output_root, PathBuf::from("/work/output"));
        assert_eq!(cfg.engine.working_dir, Some(PathBuf::from("/work")));
        assert_eq!(cfg.space.fixed().get("org").map(String::as_str), Some("Acme"));

        let dims = cfg.space.dimensions();
        assert_eq!(dims[0].name, "unit");
        assert_eq!(dims[1].values, vec!["2023", "2024"], "numbers are stringified");
        assert_eq!(cfg.space.policy(), &EnumerationPolicy::Product);
    }

    #[test]
    fn explicit_bindings_select_explicit_policy() {
        let yaml = r#"
template: t.qmd
dimensions:
  unit: [A, B]
bindings:
  - { unit: B }
"#;
        let cfg = RunConfig::from_yaml_str(yaml, Path::new(".")).unwrap();
        let set = cfg.space.enumerate().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().get("unit"), Some("B"));
    }

    #[test]
    fn unsupported_format_is_a_config_error() {
        let yaml = "template: t.qmd\nformats: [pdf, epub]\ndimensions:\n  unit: [A]\n";
        let err = RunConfig::from_yaml_str(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { ref format } if format == "epub"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let yaml = "template: t.qmd\nconcurrency: 0\ndimensions:\n  unit: [A]\n";
        let err = RunConfig::from_yaml_str(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConcurrency));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let yaml = "template: t.qmd\ntimeout_secs: 0\ndimensions:\n  unit: [A]\n";
        let err = RunConfig::from_yaml_str(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn nested_dimension_value_is_rejected() {
        let yaml = "template: t.qmd\ndimensions:\n  unit: [[A]]\n";
        let err = RunConfig::from_yaml_str(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::NonScalarValue { ref dimension, .. } if dimension == "unit"));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let yaml = "template: t.qmd\ndimension:\n  unit: [A]\n";
        let err = RunConfig::from_yaml_str(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn default_engine_targets_quarto() {
        let engine = EngineConfig::default();
        assert_eq!(engine.program, "quarto");
        assert!(engine.args.iter().any(|a| a.contains("{{ format }}")));
    }
}

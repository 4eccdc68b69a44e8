//! Domain types for a parameterized render run.
//!
//! All path fields use `PathBuf`. Dimension values are always strings; numeric
//! YAML scalars are stringified at load time.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;
use crate::ordered::OrderedMap;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque template handle. Resolved by the rendering engine, never parsed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRef(pub String);

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TemplateRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TemplateRef {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// The registered set of target formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Html,
    Docx,
}

impl OutputFormat {
    /// All formats in a stable order.
    pub fn all() -> &'static [OutputFormat] {
        &[OutputFormat::Pdf, OutputFormat::Html, OutputFormat::Docx]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Docx => "docx",
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "html" => Ok(OutputFormat::Html),
            "docx" => Ok(OutputFormat::Docx),
            _ => Err(ConfigError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// BindingDimension
// ---------------------------------------------------------------------------

/// A named axis of variation with ordered, unique values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDimension {
    pub name: String,
    pub values: Vec<String>,
}

impl BindingDimension {
    pub fn new<N, I, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject empty dimensions and repeated values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.values.is_empty() {
            return Err(ConfigError::EmptyDimension {
                dimension: self.name.clone(),
            });
        }
        for (i, value) in self.values.iter().enumerate() {
            if self.values[..i].contains(value) {
                return Err(ConfigError::DuplicateValue {
                    dimension: self.name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// One value per declared dimension, plus the run's fixed parameters.
///
/// Equality and hashing consider the dimension assignments only.
#[derive(Debug, Clone)]
pub struct Binding {
    values: Vec<(String, String)>,
    fixed: Arc<BTreeMap<String, String>>,
}

impl Binding {
    pub fn new(values: Vec<(String, String)>, fixed: Arc<BTreeMap<String, String>>) -> Self {
        Self { values, fixed }
    }

    /// Binding without fixed parameters.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            fixed: Arc::default(),
        }
    }

    /// Dimension assignments in declared dimension order.
    pub fn values(&self) -> &[(String, String)] {
        &self.values
    }

    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == dimension)
            .map(|(_, v)| v.as_str())
    }

    pub fn fixed(&self) -> &BTreeMap<String, String> {
        &self.fixed
    }

    /// Full parameter context handed to the engine: fixed params overlaid by
    /// dimension values.
    pub fn params(&self) -> BTreeMap<String, String> {
        let mut params = (*self.fixed).clone();
        for (k, v) in &self.values {
            params.insert(k.clone(), v.clone());
        }
        params
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Binding {}

impl Hash for Binding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

// Serialized as an ordered `{dimension: value}` map; fixed params are run-level
// data and are not repeated per binding.
impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OrderedMap(self.values.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Binding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = OrderedMap::<String>::deserialize(deserializer)?;
        Ok(Binding::new(map.0, Arc::default()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

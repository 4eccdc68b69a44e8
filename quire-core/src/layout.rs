//! Output layout: `(binding, format) -> relative path`.
//!
//! # Path shape
//!
//! | Binding                        | Format | Relative path          |
//! |--------------------------------|--------|------------------------|
//! | `unit=A, period=2023`          | pdf    | `a/2023/a_2023.pdf`    |
//! | `unit=North East, period=Q1`   | html   | `north-east/q1/north-east_q1.html` |
//!
//! Slugs never contain `_`, so the joined filename cannot be ambiguous.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, OutputCollisionError};
use crate::types::{Binding, OutputFormat};

/// Filesystem-safe token for a dimension value.
///
/// Lower-cases and replaces every run of whitespace or disallowed characters
/// with a single `-`. Non-ASCII letters are transliterated.
pub fn slugify_value(dimension: &str, value: &str) -> Result<String, ConfigError> {
    let token = slug::slugify(value);
    if token.is_empty() {
        return Err(ConfigError::EmptySlug {
            dimension: dimension.to_string(),
            value: value.to_string(),
        });
    }
    Ok(token)
}

/// Owns the naming convention under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pure path derivation, no I/O.
    pub fn relative_path(
        &self,
        binding: &Binding,
        format: OutputFormat,
    ) -> Result<PathBuf, ConfigError> {
        let slugs = binding
            .values()
            .iter()
            .map(|(dim, value)| slugify_value(dim, value))
            .collect::<Result<Vec<_>, _>>()?;

        let mut path = PathBuf::new();
        for slug in &slugs {
            path.push(slug);
        }
        path.push(format!("{}.{}", slugs.join("_"), format.extension()));
        Ok(path)
    }

    /// `<root>/<relative>`.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Sibling path the engine renders into before the artifact is moved into place.
///
/// `a/2023/a_2023.pdf` → `a/2023/.a_2023.partial.pdf`; the extension is kept so
/// engines that infer the format from the filename still work.
pub fn partial_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    path.with_file_name(name)
}

/// Detects two jobs claiming the same output path.
#[derive(Debug, Default)]
pub struct CollisionGuard {
    claimed: HashMap<PathBuf, String>,
}

impl CollisionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` for `binding`; fails if another binding already holds it.
    pub fn claim(
        &mut self,
        path: &Path,
        binding: &Binding,
        format: OutputFormat,
    ) -> Result<(), OutputCollisionError> {
        if let Some(first) = self.claimed.get(path) {
            return Err(OutputCollisionError {
                path: path.to_path_buf(),
                format: format.to_string(),
                first: first.clone(),
                second: binding.to_string(),
            });
        }
        self.claimed.insert(path.to_path_buf(), binding.to_string());
        Ok(())
    }
}

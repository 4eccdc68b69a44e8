//! Binding-set enumeration.
//!
//! # Ordering
//!
//! The full product walks dimensions like an odometer: declared dimension
//! order, declared value order, last dimension varying fastest. For
//! `unit: [A, B]`, `period: [2023, 2024]` the order is
//! `A/2023, A/2024, B/2023, B/2024`. Order depends on declaration only, never
//! on value content.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::types::{Binding, BindingDimension};

// ---------------------------------------------------------------------------
// BindingSpace
// ---------------------------------------------------------------------------

/// How bindings are drawn from the declared dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationPolicy {
    /// Full Cartesian product.
    Product,
    /// Caller-supplied subset, in the supplied order.
    Explicit(Vec<Vec<(String, String)>>),
}

/// A declarative parameter space: dimensions, fixed params, and a policy.
#[derive(Debug, Clone)]
pub struct BindingSpace {
    dimensions: Vec<BindingDimension>,
    fixed: Arc<BTreeMap<String, String>>,
    policy: EnumerationPolicy,
}

impl BindingSpace {
    pub fn product(dimensions: Vec<BindingDimension>) -> Self {
        Self {
            dimensions,
            fixed: Arc::default(),
            policy: EnumerationPolicy::Product,
        }
    }

    pub fn explicit(
        dimensions: Vec<BindingDimension>,
        bindings: Vec<Vec<(String, String)>>,
    ) -> Self {
        Self {
            dimensions,
            fixed: Arc::default(),
            policy: EnumerationPolicy::Explicit(bindings),
        }
    }

    /// Attach parameters shared by every binding.
    pub fn with_fixed(mut self, fixed: BTreeMap<String, String>) -> Self {
        self.fixed = Arc::new(fixed);
        self
    }

    pub fn dimensions(&self) -> &[BindingDimension] {
        &self.dimensions
    }

    pub fn fixed(&self) -> &BTreeMap<String, String> {
        &self.fixed
    }

    pub fn policy(&self) -> &EnumerationPolicy {
        &self.policy
    }

    /// Merge more fixed params over the existing ones.
    pub fn extend_fixed(&mut self, extra: impl IntoIterator<Item = (String, String)>) {
        Arc::make_mut(&mut self.fixed).extend(extra);
    }

    /// Lazy product over the declared dimensions.
    ///
    /// Restartable: every call yields a fresh iterator in the same order. The
    /// iterator does not validate; [`BindingSpace::enumerate`] does.
    pub fn iter(&self) -> ProductIter<'_> {
        ProductIter::new(&self.dimensions, self.fixed.clone())
    }

    /// Number of bindings in the full product, `None` on overflow.
    pub fn product_len(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(d.values.len()))
    }

    /// Check dimension declarations and fixed params.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions.is_empty() {
            return Err(ConfigError::NoDimensions);
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if self.dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(ConfigError::DuplicateDimension {
                    dimension: dim.name.clone(),
                });
            }
            dim.validate()?;
        }
        if let Some(name) = self
            .fixed
            .keys()
            .find(|k| self.dimensions.iter().any(|d| &d.name == *k))
        {
            return Err(ConfigError::ParamShadowsDimension { name: name.clone() });
        }
        Ok(())
    }

    /// Materialize the ordered [`BindingSet`].
    pub fn enumerate(&self) -> Result<BindingSet, ConfigError> {
        self.validate()?;
        let bindings = match &self.policy {
            EnumerationPolicy::Product => self.iter().collect(),
            EnumerationPolicy::Explicit(rows) => self.explicit_bindings(rows)?,
        };
        Ok(BindingSet {
            dimensions: self.dimensions.iter().map(|d| d.name.clone()).collect(),
            bindings,
        })
    }

    fn explicit_bindings(&self, rows: &[Vec<(String, String)>]) -> Result<Vec<Binding>, ConfigError> {
        if rows.is_empty() {
            return Err(ConfigError::NoBindings);
        }
        let mut bindings: Vec<Binding> = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let binding = self.explicit_binding(index, row)?;
            if let Some(first) = bindings.iter().position(|b| *b == binding) {
                return Err(ConfigError::DuplicateBinding { index, first });
            }
            bindings.push(binding);
        }
        Ok(bindings)
    }

    fn explicit_binding(&self, index: usize, row: &[(String, String)]) -> Result<Binding, ConfigError> {
        for (i, (name, value)) in row.iter().enumerate() {
            if row[..i].iter().any(|(k, _)| k == name) {
                return Err(ConfigError::DuplicateAssignment {
                    index,
                    dimension: name.clone(),
                });
            }
            let Some(dim) = self.dimensions.iter().find(|d| &d.name == name) else {
                return Err(ConfigError::UnknownDimension {
                    index,
                    dimension: name.clone(),
                });
            };
            if !dim.values.contains(value) {
                return Err(ConfigError::UnknownValue {
                    index,
                    dimension: name.clone(),
                    value: value.clone(),
                });
            }
        }

        // Re-order to declared dimension order so paths and equality are stable
        // regardless of how the row was written.
        let mut values = Vec::with_capacity(self.dimensions.len());
        for dim in &self.dimensions {
            let Some((_, value)) = row.iter().find(|(k, _)| *k == dim.name) else {
                return Err(ConfigError::MissingDimension {
                    index,
                    dimension: dim.name.clone(),
                });
            };
            values.push((dim.name.clone(), value.clone()));
        }
        Ok(Binding::new(values, self.fixed.clone()))
    }
}

// ---------------------------------------------------------------------------
// ProductIter
// ---------------------------------------------------------------------------

/// Odometer over the Cartesian product of a dimension slice.
#[derive(Debug, Clone)]
pub struct ProductIter<'a> {
    dimensions: &'a [BindingDimension],
    fixed: Arc<BTreeMap<String, String>>,
    cursor: Vec<usize>,
    done: bool,
}

impl<'a> ProductIter<'a> {
    fn new(dimensions: &'a [BindingDimension], fixed: Arc<BTreeMap<String, String>>) -> Self {
        let done = dimensions.is_empty() || dimensions.iter().any(|d| d.values.is_empty());
        Self {
            dimensions,
            fixed,
            cursor: vec![0; dimensions.len()],
            done,
        }
    }

    fn advance(&mut self) {
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.dimensions[pos].values.len() {
                return;
            }
            self.cursor[pos] = 0;
        }
        self.done = true;
    }
}

impl Iterator for ProductIter<'_> {
    type Item = Binding;

    fn next(&mut self) -> Option<Binding> {
        if self.done {
            return None;
        }
        let values = self
            .dimensions
            .iter()
            .zip(&self.cursor)
            .map(|(dim, &i)| (dim.name.clone(), dim.values[i].clone()))
            .collect();
        self.advance();
        Some(Binding::new(values, self.fixed.clone()))
    }
}

// ---------------------------------------------------------------------------
// BindingSet
// ---------------------------------------------------------------------------

/// The ordered bindings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSet {
    dimensions: Vec<String>,
    bindings: Vec<Binding>,
}

impl BindingSet {
    /// Dimension names in declared order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }
}

impl IntoIterator for BindingSet {
    type Item = Binding;
    type IntoIter = std::vec::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

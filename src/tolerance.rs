//! Per-category tolerance map.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{self, CategoryGroup};

/// Allowed deviation from target per category, in percent of that
/// category's target value.
///
/// Ordered by category name so iteration, display, and the programs built
/// from it are deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Tolerances(BTreeMap<String, f64>);

impl Tolerances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every category in `groups` at the same tolerance.
    pub fn uniform(groups: &[CategoryGroup], percent: f64) -> Self {
        Self(
            model::categories(groups)
                .map(|c| (c.name().to_string(), percent))
                .collect(),
        )
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(category).copied()
    }

    pub fn set(&mut self, category: impl Into<String>, percent: f64) {
        self.0.insert(category.into(), percent);
    }

    /// Arithmetic mean over all entries; 0 for an empty map.
    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.values().sum::<f64>() / self.0.len() as f64
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for Tolerances {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Tolerances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (category, pct) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{category}={pct:.4}%")?;
            first = false;
        }
        Ok(())
    }
}

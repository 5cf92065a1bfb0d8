//! Target categories and the groups they are reported in.

use crate::error::{Error, Result};

/// A target bucket, e.g. "BONDS" at 4% of the whole portfolio.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Category {
    name: String,
    target_percent: f64,
}

impl Category {
    /// Create a category; `target_percent` must lie in `[0, 100]`.
    pub fn new(name: impl Into<String>, target_percent: f64) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidPortfolio("category name is empty".into()));
        }
        if !target_percent.is_finite() || !(0.0..=100.0).contains(&target_percent) {
            return Err(Error::InvalidPortfolio(format!(
                "category {name} target must be in [0, 100], got {target_percent}"
            )));
        }
        Ok(Self {
            name,
            target_percent,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_percent(&self) -> f64 {
        self.target_percent
    }

    /// Target dollars given the portfolio's total value.
    pub fn target_value(&self, total_value: f64) -> f64 {
        self.target_percent / 100.0 * total_value
    }
}

/// A named, non-empty set of categories tracked together.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CategoryGroup {
    name: String,
    categories: Vec<Category>,
}

impl CategoryGroup {
    pub fn new(name: impl Into<String>, categories: Vec<Category>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidPortfolio("group name not set".into()));
        }
        if categories.is_empty() {
            return Err(Error::InvalidPortfolio(format!(
                "no categories added to group {name}"
            )));
        }
        Ok(Self { name, categories })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Sum of the group's category targets, in percent.
    pub fn target_percent(&self) -> f64 {
        self.categories.iter().map(Category::target_percent).sum()
    }
}

//! Stocks and their category allocations.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Allowed deviation of an allocation sum from 100%.
pub const ALLOCATION_SUM_TOLERANCE: f64 = 0.001;

/// A buyable security: ticker, expense ratio, and how its value splits
/// across categories (percent per category name, summing to ~100).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stock {
    ticker: String,
    expense_ratio: f64,
    /// Insertion-ordered so iteration is deterministic.
    allocation: Vec<(String, f64)>,
}

impl Stock {
    /// Start building a stock with the given ticker.
    pub fn builder(ticker: impl Into<String>) -> StockBuilder {
        StockBuilder {
            ticker: ticker.into(),
            expense_ratio: None,
            allocation: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Expense ratio in percent (e.g. `0.04` for 0.04%).
    pub fn expense_ratio(&self) -> f64 {
        self.expense_ratio
    }

    /// Percent of this stock allocated to `category`, if any.
    pub fn percentage(&self, category: &str) -> Option<f64> {
        self.allocation
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, pct)| *pct)
    }

    pub fn has_allocation(&self, category: &str) -> bool {
        self.percentage(category).is_some()
    }

    /// `(category, percent)` pairs in the order they were declared.
    pub fn allocations(&self) -> impl Iterator<Item = (&str, f64)> {
        self.allocation.iter().map(|(name, pct)| (name.as_str(), *pct))
    }
}

/// Builder for [`Stock`]; validates on [`build`](StockBuilder::build).
#[derive(Clone, Debug)]
pub struct StockBuilder {
    ticker: String,
    expense_ratio: Option<f64>,
    allocation: Vec<(String, f64)>,
}

impl StockBuilder {
    pub fn expense_ratio(mut self, expense_ratio: f64) -> Self {
        self.expense_ratio = Some(expense_ratio);
        self
    }

    /// Allocate `percent` of the stock to `category`. Repeating a category
    /// replaces its percent.
    pub fn allocation(mut self, category: impl Into<String>, percent: f64) -> Self {
        let category = category.into();
        match self.allocation.iter_mut().find(|(name, _)| *name == category) {
            Some(entry) => entry.1 = percent,
            None => self.allocation.push((category, percent)),
        }
        self
    }

    pub fn build(self) -> Result<Stock> {
        let invalid = |reason: String| Error::InvalidStock {
            ticker: self.ticker.clone(),
            reason,
        };

        if self.ticker.is_empty() {
            return Err(invalid("ticker is empty".into()));
        }
        let Some(expense_ratio) = self.expense_ratio else {
            return Err(invalid("expense ratio not set".into()));
        };
        if !expense_ratio.is_finite() || expense_ratio < 0.0 {
            return Err(invalid(format!(
                "expense ratio must be >= 0, got {expense_ratio}"
            )));
        }
        for (category, pct) in &self.allocation {
            if !pct.is_finite() || *pct < 0.0 {
                return Err(invalid(format!(
                    "allocation to {category} must be >= 0, got {pct}"
                )));
            }
        }

        // Floating-point inputs: accept a small band around 100.
        let total: f64 = self.allocation.iter().map(|(_, pct)| pct).sum();
        if (total - 100.0).abs() > ALLOCATION_SUM_TOLERANCE {
            let listed: FxHashMap<&str, f64> = self
                .allocation
                .iter()
                .map(|(name, pct)| (name.as_str(), *pct))
                .collect();
            return Err(invalid(format!(
                "percentage total must be 100, was {total} {listed:?}"
            )));
        }

        Ok(Stock {
            ticker: self.ticker,
            expense_ratio,
            allocation: self.allocation,
        })
    }
}

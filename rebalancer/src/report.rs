//! Human-readable reports: category allocation and per-holding diffs.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;
use stocksolver::model::{Account, CategoryGroup};

/// Target vs. actual for one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryLine {
    pub category: String,
    pub target_value: f64,
    pub target_pct: f64,
    pub actual_value: f64,
    pub actual_pct: f64,
}

/// One group's categories plus their totals.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub categories: Vec<CategoryLine>,
    pub target_value: f64,
    pub target_pct: f64,
    pub actual_value: f64,
    pub actual_pct: f64,
}

/// Where the money sits by category, against the targets.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub total: f64,
    pub groups: Vec<GroupSummary>,
    /// `(account, invested)` in account order.
    pub accounts: Vec<(String, f64)>,
}

impl AllocationReport {
    /// Summarize `accounts` against `groups`. Targets and percents are taken
    /// against `total`, normally the portfolio value before rebalancing.
    pub fn build(accounts: &[Account], groups: &[CategoryGroup], total: f64) -> Self {
        let pct = |value: f64| if total > 0.0 { value / total * 100.0 } else { 0.0 };

        let groups = groups
            .iter()
            .map(|group| {
                let categories: Vec<CategoryLine> = group
                    .categories()
                    .iter()
                    .map(|c| {
                        let actual = category_value(accounts, c.name());
                        CategoryLine {
                            category: c.name().to_string(),
                            target_value: c.target_value(total),
                            target_pct: c.target_percent(),
                            actual_value: actual,
                            actual_pct: pct(actual),
                        }
                    })
                    .collect();
                let target_value = categories.iter().map(|c| c.target_value).sum();
                let actual_value = categories.iter().map(|c| c.actual_value).sum();
                GroupSummary {
                    name: group.name().to_string(),
                    target_value,
                    target_pct: group.target_percent(),
                    actual_value,
                    actual_pct: pct(actual_value),
                    categories,
                }
            })
            .collect();

        Self {
            total,
            groups,
            accounts: accounts
                .iter()
                .map(|a| (a.name().to_string(), a.invested()))
                .collect(),
        }
    }

    /// Largest `|actual - target|` across categories, in percentage points.
    pub fn max_drift_pct(&self) -> f64 {
        self.groups
            .iter()
            .flat_map(|g| &g.categories)
            .map(|c| (c.actual_pct - c.target_pct).abs())
            .fold(0.0, f64::max)
    }
}

/// Dollars of `category` held across all accounts.
pub fn category_value(accounts: &[Account], category: &str) -> f64 {
    accounts
        .iter()
        .flat_map(|a| a.holdings())
        .filter_map(|h| {
            h.stock()
                .percentage(category)
                .map(|pct| h.current_value() * pct / 100.0)
        })
        .sum()
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ALLOCATION:")?;
        writeln!(
            f,
            "  {:14} {:>12} {:>8} {:>12} {:>8}",
            "Category", "Target", "%", "Actual", "%"
        )?;
        for group in &self.groups {
            writeln!(f, "  [{}]", group.name)?;
            for c in &group.categories {
                writeln!(
                    f,
                    "  {:14} ${:>11.2} {:>7.2}% ${:>11.2} {:>7.2}%",
                    c.category, c.target_value, c.target_pct, c.actual_value, c.actual_pct
                )?;
            }
            writeln!(
                f,
                "  {:14} ${:>11.2} {:>7.2}% ${:>11.2} {:>7.2}%",
                "--- total", group.target_value, group.target_pct, group.actual_value, group.actual_pct
            )?;
        }
        writeln!(f, "CASH INVESTED:")?;
        for (name, invested) in &self.accounts {
            writeln!(f, "  {name:14} ${invested:>11.2}")?;
        }
        writeln!(f, "  {:14} ${:>11.2}", "Total", self.total)
    }
}

/// Before/after for one holding.
#[derive(Debug, Clone, Serialize)]
pub struct DiffLine {
    pub account: String,
    pub ticker: String,
    pub new_value: f64,
    pub old_value: f64,
    pub diff: f64,
    pub locked: bool,
    pub minimum: f64,
    /// New value as a percent of the account's invested cash.
    pub account_pct: f64,
}

/// Per-holding changes from the current accounts to a rebalanced set.
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub lines: Vec<DiffLine>,
    /// `(account, invested after, value before)`.
    pub accounts: Vec<(String, f64, f64)>,
}

impl DiffReport {
    /// Pair each rebalanced holding with its original by account and ticker.
    /// Holdings missing from `original` are treated as previously empty.
    pub fn build(original: &[Account], rebalanced: &[Account]) -> Self {
        let before: FxHashMap<(&str, &str), (f64, bool, f64)> = original
            .iter()
            .flat_map(|a| {
                a.holdings().iter().map(move |h| {
                    (
                        (a.name(), h.ticker()),
                        (h.current_value(), h.is_locked(), h.minimum_balance()),
                    )
                })
            })
            .collect();
        let original_value: FxHashMap<&str, f64> =
            original.iter().map(|a| (a.name(), a.value())).collect();

        let mut lines = Vec::new();
        let mut accounts = Vec::with_capacity(rebalanced.len());
        for account in rebalanced {
            let invested = account.invested();
            for h in account.holdings() {
                let (old_value, locked, minimum) = before
                    .get(&(account.name(), h.ticker()))
                    .copied()
                    .unwrap_or((0.0, h.is_locked(), h.minimum_balance()));
                lines.push(DiffLine {
                    account: account.name().to_string(),
                    ticker: h.ticker().to_string(),
                    new_value: h.current_value(),
                    old_value,
                    diff: h.current_value() - old_value,
                    locked,
                    minimum,
                    account_pct: if invested > 0.0 {
                        h.current_value() / invested * 100.0
                    } else {
                        0.0
                    },
                });
            }
            let value_before = original_value
                .get(account.name())
                .copied()
                .unwrap_or(0.0);
            accounts.push((account.name().to_string(), invested, value_before));
        }
        Self { lines, accounts }
    }

    /// Dollars moved: half the sum of absolute diffs.
    pub fn turnover(&self) -> f64 {
        self.lines.iter().map(|l| l.diff.abs()).sum::<f64>() / 2.0
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "REBALANCE PLAN:")?;
        writeln!(
            f,
            "  {:10} {:8} {:>12} {:>12} {:>12} {:>6} {:>10} {:>7}",
            "Account", "Ticker", "New", "Old", "Diff", "Locked", "Min", "%"
        )?;
        for l in &self.lines {
            writeln!(
                f,
                "  {:10} {:8} ${:>11.2} ${:>11.2} {:>+12.2} {:>6} ${:>9.2} {:>6.2}%",
                l.account,
                l.ticker,
                l.new_value,
                l.old_value,
                l.diff,
                if l.locked { "yes" } else { "" },
                l.minimum,
                l.account_pct
            )?;
        }
        for (name, invested, before) in &self.accounts {
            writeln!(f, "  {name}: cash invested ${invested:.2} of ${before:.2}")?;
        }
        writeln!(f, "  Turnover: ${:.2}", self.turnover())
    }
}

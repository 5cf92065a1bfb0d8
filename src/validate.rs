//! Pre-solve feasibility validation.
//!
//! Catches portfolios that no tolerance could ever rebalance, before any
//! solver call is made:
//!
//! 1. every category must be reachable at its target given each account's
//!    maximum capacity for it,
//! 2. an account that must single-handedly cover several categories must be
//!    big enough for all of them,
//! 3. each such obligation must be coverable by at least one stock without
//!    pushing another category past its own target.

use std::fmt;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result, Shortfall};
use crate::model::{self, Account, CategoryGroup};

/// Target vs. maximum reachable value for one category.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryCapacity {
    pub category: String,
    pub target: f64,
    /// Σ of `by_account`.
    pub available: f64,
    /// Max value each account could devote to the category, in account order.
    pub by_account: Vec<(String, f64)>,
}

/// An account that must supply `residual` dollars of `category` because all
/// other accounts together fall short of the target.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependency {
    pub account: String,
    pub category: String,
    pub residual: f64,
    pub target: f64,
}

/// Buying `ticker` to cover a dependency would overshoot another category.
///
/// Non-fatal on its own: another stock in the account may still work.
#[derive(Clone, Debug, PartialEq)]
pub struct Breach {
    pub ticker: String,
    pub account: String,
    /// The dependent category the purchase is for.
    pub category: String,
    /// The category pushed over its target.
    pub breached: String,
    /// Dollars above the breached category's target.
    pub overshoot: f64,
    /// `overshoot` as a percent of the whole portfolio.
    pub overshoot_pct: f64,
}

/// Diagnostics from a successful validation.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ValidationReport {
    pub total_value: f64,
    pub capacities: Vec<CategoryCapacity>,
    pub dependencies: Vec<Dependency>,
    pub breaches: Vec<Breach>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FEASIBILITY (total ${:.2}):", self.total_value)?;
        for c in &self.capacities {
            writeln!(
                f,
                "  {}: target ${:.2}, max avail ${:.2}",
                c.category, c.target, c.available
            )?;
        }
        if !self.dependencies.is_empty() {
            writeln!(f, "DEPENDENT ACCOUNTS:")?;
            for d in &self.dependencies {
                writeln!(
                    f,
                    "  {} must supply ${:.2} of {} (target ${:.2})",
                    d.account, d.residual, d.category, d.target
                )?;
            }
        }
        if !self.breaches.is_empty() {
            writeln!(f, "FINDINGS:")?;
            for b in &self.breaches {
                writeln!(
                    f,
                    "  [WARN] {} in {} for {} overshoots {} by ${:.2} ({:.2}%)",
                    b.ticker, b.account, b.category, b.breached, b.overshoot, b.overshoot_pct
                )?;
            }
        }
        Ok(())
    }
}

/// Max dollars `account` could put into `category`.
///
/// Locked holdings contribute only what they hold; any unlocked holding
/// could in principle absorb the whole account.
pub fn max_account_capacity(account: &Account, category: &str) -> f64 {
    account
        .holdings()
        .iter()
        .filter_map(|h| {
            let pct = h.stock().percentage(category)?;
            let base = if h.is_locked() {
                h.current_value()
            } else {
                account.value()
            };
            Some(pct / 100.0 * base)
        })
        .sum()
}

/// Validate `accounts` against `groups`, failing on the first fatal finding.
pub fn validate(accounts: &[Account], groups: &[CategoryGroup]) -> Result<ValidationReport> {
    let total_value = model::total_value(accounts);
    let mut report = ValidationReport {
        total_value,
        ..Default::default()
    };

    let mut targets: Vec<(&str, f64)> = Vec::new();
    for category in model::categories(groups) {
        let target = category.target_value(total_value);
        targets.push((category.name(), target));

        let mut by_account = Vec::with_capacity(accounts.len());
        for account in accounts {
            let max = max_account_capacity(account, category.name());
            info!(
                "Category {} - Account {} - Target: ${:.2}, Max avail: ${:.2}",
                category.name(),
                account.name(),
                target,
                max
            );
            by_account.push((account.name().to_string(), max));
        }
        let available: f64 = by_account.iter().map(|(_, v)| v).sum();
        info!(
            "Category {} - Target: ${:.2}, Max avail: ${:.2}",
            category.name(),
            target,
            available
        );

        if available < target {
            return Err(Error::InsufficientCapacity {
                category: category.name().to_string(),
                target,
                available,
            });
        }

        if let Some(dep) = dependent_account(category.name(), target, &by_account) {
            report.dependencies.push(dep);
        }
        report.capacities.push(CategoryCapacity {
            category: category.name().to_string(),
            target,
            available,
            by_account,
        });
    }

    check_overcommitted(accounts, &report.dependencies)?;
    report.breaches = check_satisfiable(accounts, &report.dependencies, &targets, total_value)?;
    Ok(report)
}

/// The largest-capacity account, if the others can't reach `target` alone.
fn dependent_account(
    category: &str,
    target: f64,
    by_account: &[(String, f64)],
) -> Option<Dependency> {
    let mut sorted: Vec<&(String, f64)> = by_account.iter().collect();
    // Stable: among equal capacities the later account is the dependent one.
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (largest, others) = sorted.split_last()?;
    let residual = target - others.iter().map(|(_, v)| v).sum::<f64>();
    (residual > 0.0).then(|| Dependency {
        account: largest.0.clone(),
        category: category.to_string(),
        residual,
        target,
    })
}

fn check_overcommitted(accounts: &[Account], dependencies: &[Dependency]) -> Result<()> {
    for account in accounts {
        let deps: Vec<&Dependency> = dependencies
            .iter()
            .filter(|d| d.account == account.name())
            .collect();
        if deps.is_empty() {
            continue;
        }
        let committed: f64 = deps.iter().map(|d| d.residual).sum();
        let categories: Vec<String> = deps
            .iter()
            .map(|d| format!("{} ${:.2}", d.category, d.residual))
            .collect();
        if committed > account.value() {
            return Err(Error::OverCommittedAccount {
                account: account.name().to_string(),
                committed,
                value: account.value(),
                categories,
            });
        }
        info!(
            "Categories that are dependent on account {}: {}",
            account.name(),
            categories.join(", ")
        );
    }
    Ok(())
}

/// For every dependency, look for one stock that covers the residual without
/// overshooting any other category's target.
fn check_satisfiable(
    accounts: &[Account],
    dependencies: &[Dependency],
    targets: &[(&str, f64)],
    total_value: f64,
) -> Result<Vec<Breach>> {
    let by_name: FxHashMap<&str, &Account> = accounts.iter().map(|a| (a.name(), a)).collect();
    let mut breaches = Vec::new();
    let mut unsatisfied = Vec::new();

    for dep in dependencies {
        let Some(account) = by_name.get(dep.account.as_str()) else {
            continue;
        };
        let mut satisfied = false;

        for holding in account.holdings() {
            let stock = holding.stock();
            let Some(pct) = stock.percentage(&dep.category).filter(|p| *p > 0.0) else {
                continue;
            };
            let purchase = dep.residual / (pct / 100.0);

            let mut fits = true;
            for &(category, target) in targets {
                if category == dep.category {
                    continue;
                }
                let Some(cross) = stock.percentage(category) else {
                    continue;
                };
                let realized = cross / 100.0 * purchase;
                if realized > target {
                    let overshoot = realized - target;
                    let overshoot_pct = if total_value > 0.0 {
                        overshoot / total_value * 100.0
                    } else {
                        0.0
                    };
                    warn!(
                        "Stock {} in account {} must be purchased for category {}, but doing so \
                         puts category {} over its target value by ${:.2} - {:.2}%",
                        stock.ticker(),
                        account.name(),
                        dep.category,
                        category,
                        overshoot,
                        overshoot_pct
                    );
                    breaches.push(Breach {
                        ticker: stock.ticker().to_string(),
                        account: account.name().to_string(),
                        category: dep.category.clone(),
                        breached: category.to_string(),
                        overshoot,
                        overshoot_pct,
                    });
                    fits = false;
                }
            }
            satisfied |= fits;
        }

        if !satisfied {
            unsatisfied.push(Shortfall {
                account: dep.account.clone(),
                category: dep.category.clone(),
                residual: dep.residual,
            });
        }
    }

    if unsatisfied.is_empty() {
        Ok(breaches)
    } else {
        Err(Error::UnsatisfiableDependency {
            dependencies: unsatisfied,
        })
    }
}

//! Portfolio file (portfolio.json) loading and conversion.
//!
//! The file has three sections:
//! - `stocks`: ticker, expense ratio, and category allocation
//! - `allocations`: category target percents, optionally grouped
//! - `holdings`: what each account holds today

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use stocksolver::Portfolio;
use stocksolver::model::{Account, Category, CategoryGroup, Holding, Stock};

use crate::error::{Error, Result};

/// Group used for allocations that don't name one.
pub const DEFAULT_GROUP: &str = "Default";

/// Raw contents of a portfolio file.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioFile {
    pub stocks: Vec<StockEntry>,
    pub allocations: Vec<AllocationEntry>,
    pub holdings: Vec<HoldingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockEntry {
    pub ticker: String,
    /// Percent per year, e.g. `0.04`.
    pub expense_ratio: f64,
    /// Category name to percent of the stock.
    pub allocation: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationEntry {
    pub category: String,
    pub percent: f64,
    #[serde(default = "default_group")]
    pub group: String,
}

fn default_group() -> String {
    DEFAULT_GROUP.into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldingEntry {
    pub account: String,
    pub ticker: String,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default)]
    pub locked: bool,
    /// Locked through this date (inclusive).
    #[serde(default)]
    pub locked_until: Option<NaiveDate>,
}

impl HoldingEntry {
    pub fn is_locked(&self, today: NaiveDate) -> bool {
        self.locked || self.locked_until.is_some_and(|d| d >= today)
    }
}

impl PortfolioFile {
    /// Load a portfolio.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::PortfolioRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the validated in-memory portfolio.
    ///
    /// Zero-percent allocations are dropped. Holdings of tickers missing from
    /// `stocks` are skipped with a warning, but their value still counts
    /// toward the account (it is cash to redeploy). Accounts worth nothing
    /// are skipped.
    pub fn into_portfolio(self, today: NaiveDate) -> Result<Portfolio> {
        let stocks = self.build_stocks()?;
        let groups = build_groups(&self.allocations)?;
        let accounts = build_accounts(&self.holdings, &stocks, today)?;
        Ok(Portfolio::new(accounts, groups)?)
    }

    fn build_stocks(&self) -> Result<FxHashMap<String, Arc<Stock>>> {
        let mut stocks = FxHashMap::default();
        for entry in &self.stocks {
            let mut builder = Stock::builder(entry.ticker.as_str()).expense_ratio(entry.expense_ratio);
            for (category, &pct) in &entry.allocation {
                if pct == 0.0 {
                    continue;
                }
                builder = builder.allocation(category.as_str(), pct);
            }
            let stock = Arc::new(builder.build()?);
            if stocks.insert(entry.ticker.clone(), stock).is_some() {
                return Err(Error::Portfolio(format!(
                    "duplicate ticker: {}",
                    entry.ticker
                )));
            }
        }
        Ok(stocks)
    }
}

fn build_groups(allocations: &[AllocationEntry]) -> Result<Vec<CategoryGroup>> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_group: FxHashMap<&str, Vec<Category>> = FxHashMap::default();
    for entry in allocations {
        if entry.percent == 0.0 {
            debug!("skipping zero allocation: {}", entry.category);
            continue;
        }
        let category = Category::new(entry.category.as_str(), entry.percent)?;
        by_group
            .entry(entry.group.as_str())
            .or_insert_with(|| {
                order.push(entry.group.as_str());
                Vec::new()
            })
            .push(category);
    }

    let mut groups = Vec::with_capacity(order.len());
    for name in order {
        let categories = by_group.remove(name).unwrap_or_default();
        groups.push(CategoryGroup::new(name, categories)?);
    }
    Ok(groups)
}

fn build_accounts(
    entries: &[HoldingEntry],
    stocks: &FxHashMap<String, Arc<Stock>>,
    today: NaiveDate,
) -> Result<Vec<Account>> {
    let mut order: Vec<&str> = Vec::new();
    let mut value: FxHashMap<&str, f64> = FxHashMap::default();
    let mut holdings: FxHashMap<&str, Vec<Holding>> = FxHashMap::default();
    let mut seen: FxHashSet<(&str, &str)> = FxHashSet::default();

    for entry in entries {
        let account = entry.account.as_str();
        if !seen.insert((account, entry.ticker.as_str())) {
            return Err(Error::Portfolio(format!(
                "duplicate holding {} in account {account}",
                entry.ticker
            )));
        }
        if !value.contains_key(account) {
            order.push(account);
        }
        *value.entry(account).or_insert(0.0) += entry.current_value;

        let Some(stock) = stocks.get(&entry.ticker) else {
            warn!(
                "skipping adding ticker to account {account} because not defined in stocks: {}",
                entry.ticker
            );
            continue;
        };
        let locked = entry.is_locked(today);
        if locked {
            info!("holding {} in {account} is locked", entry.ticker);
        }
        let holding = Holding::new(stock.clone(), entry.min_value, locked, entry.current_value)?;
        holdings.entry(account).or_default().push(holding);
    }

    let mut accounts = Vec::with_capacity(order.len());
    for name in order {
        let total = value.get(name).copied().unwrap_or(0.0);
        if total == 0.0 {
            debug!("skipping account with zero value: {name}");
            continue;
        }
        let Some(held) = holdings.remove(name) else {
            warn!("skipping account {name}: none of its tickers are defined in stocks");
            continue;
        };
        accounts.push(Account::new(name, total, held)?);
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn sample_json() -> &'static str {
        r#"{
            "stocks": [
                { "ticker": "VTSAX", "expense_ratio": 0.04, "allocation": { "DOMESTIC": 100 } },
                { "ticker": "VBTLX", "expense_ratio": 0.05, "allocation": { "BONDS": 100, "TIPS": 0 } },
                { "ticker": "VTV", "expense_ratio": 0.04,
                  "allocation": { "DOMESTIC": 74, "VALUE": 26 } }
            ],
            "allocations": [
                { "category": "DOMESTIC", "percent": 58, "group": "equity" },
                { "category": "VALUE", "percent": 2, "group": "equity" },
                { "category": "BONDS", "percent": 40 },
                { "category": "TIPS", "percent": 0 }
            ],
            "holdings": [
                { "account": "IRA", "ticker": "VTSAX", "current_value": 3000 },
                { "account": "IRA", "ticker": "VTV", "current_value": 1000, "locked": true },
                { "account": "IRA", "ticker": "CASH", "current_value": 500 },
                { "account": "TAXABLE", "ticker": "VBTLX", "current_value": 2000, "min_value": 50,
                  "locked_until": "2026-02-01" },
                { "account": "TAXABLE", "ticker": "VTSAX", "current_value": 0,
                  "locked_until": "2026-12-31" },
                { "account": "OLD", "ticker": "VTSAX", "current_value": 0 }
            ]
        }"#
    }

    #[test]
    fn converts_sample() {
        let portfolio = PortfolioFile::from_json(sample_json())
            .unwrap()
            .into_portfolio(today())
            .unwrap();

        let names: Vec<&str> = portfolio.accounts().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["IRA", "TAXABLE"]);

        // CASH isn't a known stock but its value is still the IRA's to invest.
        let ira = &portfolio.accounts()[0];
        assert_eq!(ira.value(), 4500.0);
        assert_eq!(ira.holdings().len(), 2);
        assert!(ira.holding("VTV").unwrap().is_locked());

        let taxable = &portfolio.accounts()[1];
        assert!(!taxable.holding("VBTLX").unwrap().is_locked());
        assert_eq!(taxable.holding("VBTLX").unwrap().minimum_balance(), 50.0);
        assert!(taxable.holding("VTSAX").unwrap().is_locked());

        let groups: Vec<&str> = portfolio.category_groups().iter().map(|g| g.name()).collect();
        assert_eq!(groups, vec!["equity", DEFAULT_GROUP]);
        assert_eq!(portfolio.categories().count(), 3);
    }

    #[test]
    fn account_with_only_unknown_tickers_skipped() {
        let mut file = PortfolioFile::from_json(sample_json()).unwrap();
        file.holdings.push(HoldingEntry {
            account: "OLD401K".into(),
            ticker: "DELISTED".into(),
            current_value: 500.0,
            min_value: 0.0,
            locked: false,
            locked_until: None,
        });
        let portfolio = file.into_portfolio(today()).unwrap();

        let names: Vec<&str> = portfolio.accounts().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["IRA", "TAXABLE"]);
        assert_eq!(portfolio.total_value(), 6500.0);
    }

    #[test]
    fn zero_percent_allocations_dropped_from_stocks() {
        let portfolio = PortfolioFile::from_json(sample_json())
            .unwrap()
            .into_portfolio(today())
            .unwrap();
        let bonds = portfolio.accounts()[1].holding("VBTLX").unwrap().stock();
        assert!(!bonds.has_allocation("TIPS"));
    }

    #[test]
    fn duplicate_holding_rejected() {
        let mut file = PortfolioFile::from_json(sample_json()).unwrap();
        let dup = file.holdings[0].clone();
        file.holdings.push(dup);
        assert!(matches!(
            file.into_portfolio(today()),
            Err(Error::Portfolio(msg)) if msg.contains("duplicate holding VTSAX")
        ));
    }

    #[test]
    fn duplicate_ticker_rejected() {
        let mut file = PortfolioFile::from_json(sample_json()).unwrap();
        let dup = file.stocks[0].clone();
        file.stocks.push(dup);
        assert!(matches!(
            file.into_portfolio(today()),
            Err(Error::Portfolio(_))
        ));
    }

    #[test]
    fn bad_stock_surfaces_core_error() {
        let json = sample_json().replace("\"VALUE\": 26", "\"VALUE\": 20");
        let err = PortfolioFile::from_json(&json)
            .unwrap()
            .into_portfolio(today())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Solver(stocksolver::Error::InvalidStock { .. })
        ));
    }

    #[test]
    fn targets_must_sum_to_100() {
        let json = sample_json().replace("\"percent\": 40", "\"percent\": 30");
        let err = PortfolioFile::from_json(&json)
            .unwrap()
            .into_portfolio(today())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Solver(stocksolver::Error::InvalidPortfolio(_))
        ));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            PortfolioFile::from_json("{ \"stocks\": "),
            Err(Error::PortfolioParse(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PortfolioFile::load(&dir.path().join("nope.json")),
            Err(Error::PortfolioRead { .. })
        ));
    }
}

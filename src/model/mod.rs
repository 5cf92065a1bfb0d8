//! Portfolio data model: stocks, holdings, accounts, categories.
//!
//! Everything here is immutable once built. A rebalance never edits an
//! [`Account`]; it produces new ones.
//!
//! ```
//! use std::sync::Arc;
//! use stocksolver::model::{Account, Category, CategoryGroup, Holding, Portfolio, Stock};
//!
//! let bonds = Arc::new(
//!     Stock::builder("VBIIX").expense_ratio(0.07).allocation("BONDS", 100.0).build()?,
//! );
//! let stocks = Arc::new(
//!     Stock::builder("VTSAX").expense_ratio(0.04).allocation("EQUITY", 100.0).build()?,
//! );
//! let ira = Account::from_holdings(
//!     "IRA",
//!     vec![
//!         Holding::new(bonds, 0.0, false, 250.0)?,
//!         Holding::new(stocks, 0.0, false, 750.0)?,
//!     ],
//! )?;
//! let groups = vec![CategoryGroup::new(
//!     "all",
//!     vec![Category::new("BONDS", 40.0)?, Category::new("EQUITY", 60.0)?],
//! )?];
//!
//! let portfolio = Portfolio::new(vec![ira], groups)?;
//! assert_eq!(portfolio.total_value(), 1000.0);
//! # Ok::<(), stocksolver::Error>(())
//! ```

mod account;
mod category;
mod stock;

pub use account::{Account, Holding};
pub use category::{Category, CategoryGroup};
pub use stock::{ALLOCATION_SUM_TOLERANCE, Stock, StockBuilder};

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

/// Sum of all account values.
pub fn total_value(accounts: &[Account]) -> f64 {
    accounts.iter().map(Account::value).sum()
}

/// Every category across all groups, in group order.
pub fn categories(groups: &[CategoryGroup]) -> impl Iterator<Item = &Category> {
    groups.iter().flat_map(|g| g.categories().iter())
}

/// Accounts plus the category groups they are balanced against.
///
/// Construction enforces what a storage provider guarantees: unique account
/// and category names, and category targets summing to 100%.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Portfolio {
    accounts: Vec<Account>,
    category_groups: Vec<CategoryGroup>,
}

impl Portfolio {
    pub fn new(accounts: Vec<Account>, category_groups: Vec<CategoryGroup>) -> Result<Self> {
        let mut names = FxHashSet::default();
        for account in &accounts {
            if !names.insert(account.name()) {
                return Err(Error::InvalidPortfolio(format!(
                    "duplicate account: {}",
                    account.name()
                )));
            }
        }

        let mut seen = FxHashSet::default();
        for category in categories(&category_groups) {
            if !seen.insert(category.name()) {
                return Err(Error::InvalidPortfolio(format!(
                    "duplicate category: {}",
                    category.name()
                )));
            }
        }

        let total: f64 = category_groups.iter().map(CategoryGroup::target_percent).sum();
        if !category_groups.is_empty() && (total - 100.0).abs() > ALLOCATION_SUM_TOLERANCE {
            return Err(Error::InvalidPortfolio(format!(
                "category percentages don't sum to 100: {total}"
            )));
        }

        Ok(Self {
            accounts,
            category_groups,
        })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn category_groups(&self) -> &[CategoryGroup] {
        &self.category_groups
    }

    pub fn total_value(&self) -> f64 {
        total_value(&self.accounts)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        categories(&self.category_groups)
    }
}

//! Accounts and the holdings inside them.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::Stock;

/// A position in one stock inside one account.
///
/// All amounts are in dollars.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Holding {
    stock: Arc<Stock>,
    minimum_balance: f64,
    locked: bool,
    current_value: f64,
}

impl Holding {
    /// Create a holding. Fails for negative or non-finite amounts.
    pub fn new(
        stock: Arc<Stock>,
        minimum_balance: f64,
        locked: bool,
        current_value: f64,
    ) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidHolding {
            ticker: stock.ticker().to_string(),
            reason,
        };
        if !minimum_balance.is_finite() || minimum_balance < 0.0 {
            return Err(invalid(format!(
                "minimum balance must be >= 0, got {minimum_balance}"
            )));
        }
        if !current_value.is_finite() || current_value < 0.0 {
            return Err(invalid(format!(
                "current value must be >= 0, got {current_value}"
            )));
        }
        Ok(Self {
            stock,
            minimum_balance,
            locked,
            current_value,
        })
    }

    /// An unlocked holding with nothing in it yet.
    pub fn empty(stock: Arc<Stock>) -> Self {
        Self {
            stock,
            minimum_balance: 0.0,
            locked: false,
            current_value: 0.0,
        }
    }

    pub fn stock(&self) -> &Arc<Stock> {
        &self.stock
    }

    pub fn ticker(&self) -> &str {
        self.stock.ticker()
    }

    pub fn minimum_balance(&self) -> f64 {
        self.minimum_balance
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Dollar value held now (or, in a solved account, the target value).
    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    /// Lowest value a rebalance may assign: the pinned current value when
    /// locked, otherwise the minimum balance.
    pub fn floor(&self) -> f64 {
        if self.locked {
            self.current_value
        } else {
            self.minimum_balance
        }
    }

    /// Same holding with a new value; minimum and lock flag carried over.
    pub fn with_value(&self, value: f64) -> Self {
        Self {
            current_value: value,
            ..self.clone()
        }
    }
}

/// A named account holding an ordered list of positions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Account {
    name: String,
    value: f64,
    holdings: Vec<Holding>,
}

impl Account {
    /// Create an account with an explicit total value.
    pub fn new(name: impl Into<String>, value: f64, holdings: Vec<Holding>) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: &str| Error::InvalidAccount {
            name: name.clone(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("name not set"));
        }
        if holdings.is_empty() {
            return Err(invalid("no stocks added"));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("value must be finite and >= 0"));
        }
        Ok(Self {
            name,
            value,
            holdings,
        })
    }

    /// Create an account whose value is the sum of its holdings.
    pub fn from_holdings(name: impl Into<String>, holdings: Vec<Holding>) -> Result<Self> {
        let value = holdings.iter().map(Holding::current_value).sum();
        Self::new(name, value, holdings)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total dollars available in this account.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    /// Sum of holding values (equals `value()` after a fully invested solve).
    pub fn invested(&self) -> f64 {
        self.holdings.iter().map(Holding::current_value).sum()
    }

    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker() == ticker)
    }
}

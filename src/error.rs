//! Error types for model construction, validation, and calibration.

use std::fmt;

use crate::lp::SolveStatus;

/// A category an account is forced to cover on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct Shortfall {
    pub account: String,
    pub category: String,
    /// Dollars the account must supply toward the category.
    pub residual: f64,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} needs ${:.2} of {}",
            self.account, self.residual, self.category
        )
    }
}

/// All errors raised by the solver core.
///
/// Probe-level infeasibility is not an error: the builder reports it as
/// [`RebalanceOutcome::NoSolution`](crate::RebalanceOutcome::NoSolution) and
/// the calibration loop treats it as "tolerance too tight".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid stock {ticker}: {reason}")]
    InvalidStock { ticker: String, reason: String },

    #[error("invalid holding of {ticker}: {reason}")]
    InvalidHolding { ticker: String, reason: String },

    #[error("invalid account {name:?}: {reason}")]
    InvalidAccount { name: String, reason: String },

    #[error("invalid portfolio: {0}")]
    InvalidPortfolio(String),

    #[error(
        "accounts can't buy enough of category {category}: target ${target:.2}, max available ${available:.2} (short ${:.2})",
        .target - .available
    )]
    InsufficientCapacity {
        category: String,
        target: f64,
        available: f64,
    },

    #[error(
        "too many categories depend on account {account}: ${committed:.2} committed > ${value:.2} value ({})",
        .categories.join(", ")
    )]
    OverCommittedAccount {
        account: String,
        committed: f64,
        value: f64,
        categories: Vec<String>,
    },

    #[error(
        "unable to find a stock for some dependent categories: {}",
        join_shortfalls(.dependencies)
    )]
    UnsatisfiableDependency { dependencies: Vec<Shortfall> },

    #[error("no tolerance given for category {0}")]
    MissingTolerance(String),

    #[error("no rebalance possible: no feasible tolerance in [0, 100] (epsilon {epsilon})")]
    CalibrationExhausted { epsilon: f64 },

    #[error("final solve with calibrated tolerances returned {0}")]
    FinalSolveFailed(SolveStatus),
}

fn join_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// True for the errors raised by the feasibility validator.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCapacity { .. }
                | Error::OverCommittedAccount { .. }
                | Error::UnsatisfiableDependency { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! # stocksolver
//!
//! Rebalances a set of investment accounts toward category targets at the
//! lowest yearly expense.
//!
//! ## Features
//!
//! - **Feasibility validation**: rejects portfolios no tolerance could fix,
//!   before any solve
//! - **LP formulation**: one variable per (account, holding), ranged category
//!   rows, expense-ratio objective
//! - **Tolerance calibration**: global bisection, then per-category
//!   refinement over random category orders
//! - **Pluggable solver**: anything implementing [`LpSolver`]; a dense
//!   simplex ([`SimplexSolver`]) ships with the crate
//! - **Deterministic**: ordered inputs, seeded randomness
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use stocksolver::model::{Account, Category, CategoryGroup, Holding, Stock};
//! use stocksolver::{CalibrationConfig, Calibrator, SimplexSolver, validate};
//!
//! let bonds = Arc::new(Stock::builder("BND").expense_ratio(0.03).allocation("BONDS", 100.0).build()?);
//! let total = Arc::new(Stock::builder("VTI").expense_ratio(0.03).allocation("EQUITY", 100.0).build()?);
//! let ira = Account::from_holdings(
//!     "IRA",
//!     vec![Holding::new(bonds, 0.0, false, 100.0)?, Holding::new(total, 0.0, false, 900.0)?],
//! )?;
//! let groups = vec![CategoryGroup::new(
//!     "all",
//!     vec![Category::new("BONDS", 40.0)?, Category::new("EQUITY", 60.0)?],
//! )?];
//! let accounts = vec![ira];
//!
//! validate(&accounts, &groups)?;
//!
//! let config = CalibrationConfig { trials: 5, ..Default::default() };
//! let mut calibrator = Calibrator::new(SimplexSolver::new(), StdRng::seed_from_u64(1), config);
//! let result = calibrator.calibrate(&accounts, &groups)?;
//!
//! let ira = &result.rebalance.accounts[0];
//! assert!((ira.holding("BND").unwrap().current_value() - 400.0).abs() < 0.1);
//! # Ok::<(), stocksolver::Error>(())
//! ```
//!
//! ## Tolerances
//!
//! A tolerance of `t` for a category with target `T` dollars lets the solved
//! value fall anywhere in `T ± t% · T`. Calibration looks for the smallest
//! such values the accounts can actually reach.

pub mod builder;
pub mod calibrate;
mod error;
pub mod lp;
pub mod model;
pub mod search;
pub mod solver;
pub mod tolerance;
pub mod validate;

// Re-export public API
pub use builder::{
    BuiltProblem, InvestMode, Rebalance, RebalanceOutcome, build_problem, is_feasible,
    solve_rebalance,
};
pub use calibrate::{Calibration, CalibrationConfig, Calibrator};
pub use error::{Error, Result, Shortfall};
pub use lp::{LinearProgram, Solution, SolveStatus, VarId};
pub use model::Portfolio;
pub use search::{binary_search, search_tolerance};
pub use solver::{LpSolver, SimplexSolver};
pub use tolerance::Tolerances;
pub use validate::{ValidationReport, validate};

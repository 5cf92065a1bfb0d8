//! Turns accounts, category targets and tolerances into a linear program,
//! and solved programs back into rebalanced accounts.
//!
//! # Formulation
//!
//! - one variable per (account, holding), `[minimum_balance, ∞)` or pinned
//!   to the current value when locked
//! - one row per account: holdings sum to the account value (or at most the
//!   account value when maximizing the invested amount)
//! - one ranged row per category: `target ± tolerance% · target`, where the
//!   target is taken against the total of all accounts
//! - objective: minimize `Σ value · expense_ratio`
//!
//! Expense ratios are percents, so the objective divided by 100 is the
//! yearly cost in dollars.

use log::debug;

use crate::error::{Error, Result};
use crate::lp::{LinearProgram, Sense, SolveStatus, VarId};
use crate::model::{self, Account, CategoryGroup};
use crate::solver::LpSolver;
use crate::tolerance::Tolerances;

/// Slack given to the deployed-cash floor on the second maximize pass.
pub const DEPLOYED_SLACK: f64 = 1e-6;

/// How account cash must be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum InvestMode {
    /// Every account is fully invested.
    #[default]
    FullyInvested,
    /// Accounts may hold uninvested cash: first maximize the amount placed,
    /// then minimize expenses at that amount.
    MaximizeInvested,
}

/// A program plus the variable of every holding, per account.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltProblem {
    pub program: LinearProgram,
    /// `vars[a][h]` is the variable of holding `h` in account `a`.
    pub vars: Vec<Vec<VarId>>,
}

/// Build the program for one tolerance map.
///
/// Fails only when `tolerances` has no entry for one of the categories.
pub fn build_problem(
    accounts: &[Account],
    groups: &[CategoryGroup],
    tolerances: &Tolerances,
    mode: InvestMode,
) -> Result<BuiltProblem> {
    let mut lp = LinearProgram::new();
    let total = model::total_value(accounts);

    let mut vars = Vec::with_capacity(accounts.len());
    for account in accounts {
        let mut ids = Vec::with_capacity(account.holdings().len());
        for holding in account.holdings() {
            let name = format!("_{}_{}", account.name(), holding.ticker());
            let upper = if holding.is_locked() {
                holding.current_value()
            } else {
                f64::INFINITY
            };
            let id = lp.add_variable(name, holding.floor(), upper);
            ids.push(id);
        }
        let terms = ids.iter().map(|&id| (id, 1.0)).collect();
        match mode {
            InvestMode::FullyInvested => {
                lp.add_constraint(account.name(), account.value(), account.value(), terms)
            }
            InvestMode::MaximizeInvested => {
                lp.add_constraint(account.name(), f64::NEG_INFINITY, account.value(), terms)
            }
        }
        vars.push(ids);
    }

    for category in model::categories(groups) {
        let tolerance = tolerances
            .get(category.name())
            .ok_or_else(|| Error::MissingTolerance(category.name().to_string()))?;
        let target = category.target_value(total);
        let slack = tolerance / 100.0 * target;

        let mut terms = Vec::new();
        for (account, ids) in accounts.iter().zip(&vars) {
            for (holding, &id) in account.holdings().iter().zip(ids) {
                if let Some(pct) = holding.stock().percentage(category.name()) {
                    terms.push((id, pct / 100.0));
                }
            }
        }
        lp.add_constraint(category.name(), target - slack, target + slack, terms);
    }

    let objective = match mode {
        InvestMode::FullyInvested => (Sense::Minimize, expense_terms(accounts, &vars)),
        InvestMode::MaximizeInvested => (Sense::Maximize, all_terms(&vars)),
    };
    lp.set_objective(objective.0, objective.1);

    Ok(BuiltProblem { program: lp, vars })
}

fn expense_terms(accounts: &[Account], vars: &[Vec<VarId>]) -> Vec<(VarId, f64)> {
    accounts
        .iter()
        .zip(vars)
        .flat_map(|(account, ids)| {
            account
                .holdings()
                .iter()
                .zip(ids)
                .map(|(h, &id)| (id, h.stock().expense_ratio()))
        })
        .collect()
}

fn all_terms(vars: &[Vec<VarId>]) -> Vec<(VarId, f64)> {
    vars.iter().flatten().map(|&id| (id, 1.0)).collect()
}

/// A solved rebalance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rebalance {
    /// New accounts, holding values set to their targets.
    pub accounts: Vec<Account>,
    /// Yearly expense in dollars.
    pub yearly_expense: f64,
    /// Total dollars placed across all accounts.
    pub deployed: f64,
}

/// Result of one solve attempt. Infeasibility is an outcome, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum RebalanceOutcome {
    Solved(Rebalance),
    NoSolution(SolveStatus),
}

impl RebalanceOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, RebalanceOutcome::Solved(_))
    }

    pub fn into_rebalance(self) -> Option<Rebalance> {
        match self {
            RebalanceOutcome::Solved(r) => Some(r),
            RebalanceOutcome::NoSolution(_) => None,
        }
    }
}

/// Run only the first pass and report whether it was optimal.
pub fn is_feasible<S: LpSolver + ?Sized>(
    solver: &mut S,
    accounts: &[Account],
    groups: &[CategoryGroup],
    tolerances: &Tolerances,
    mode: InvestMode,
) -> Result<bool> {
    let built = build_problem(accounts, groups, tolerances, mode)?;
    Ok(solver.solve(&built.program).is_optimal())
}

/// Build, solve, and extract new accounts.
pub fn solve_rebalance<S: LpSolver + ?Sized>(
    solver: &mut S,
    accounts: &[Account],
    groups: &[CategoryGroup],
    tolerances: &Tolerances,
    mode: InvestMode,
) -> Result<RebalanceOutcome> {
    let built = build_problem(accounts, groups, tolerances, mode)?;
    let mut solution = solver.solve(&built.program);
    if !solution.is_optimal() {
        debug!("solve at [{tolerances}] -> {}", solution.status);
        return Ok(RebalanceOutcome::NoSolution(solution.status));
    }

    if mode == InvestMode::MaximizeInvested {
        let deployed: f64 = solution.values.iter().sum();
        let mut second = built.program.clone();
        second.add_constraint(
            "deployed",
            deployed - DEPLOYED_SLACK,
            f64::INFINITY,
            all_terms(&built.vars),
        );
        second.set_objective(Sense::Minimize, expense_terms(accounts, &built.vars));
        solution = solver.solve(&second);
        if !solution.is_optimal() {
            debug!("expense pass at ${deployed:.2} deployed -> {}", solution.status);
            return Ok(RebalanceOutcome::NoSolution(solution.status));
        }
    }

    let mut rebalanced = Vec::with_capacity(accounts.len());
    for (account, ids) in accounts.iter().zip(&built.vars) {
        let holdings = account
            .holdings()
            .iter()
            .zip(ids)
            .map(|(h, &id)| h.with_value(solution.value(id)))
            .collect();
        rebalanced.push(Account::from_holdings(account.name(), holdings)?);
    }
    let deployed = model::total_value(&rebalanced);

    Ok(RebalanceOutcome::Solved(Rebalance {
        accounts: rebalanced,
        yearly_expense: solution.objective_value / 100.0,
        deployed,
    }))
}

//! Tolerance calibration.
//!
//! Finds the tightest per-category tolerances the solver can still satisfy:
//!
//! 1. **Global pass**: bisect one tolerance shared by every category.
//! 2. **Refinement**: for a number of random category orders, walk the
//!    categories and bisect each one's tolerance below its working value
//!    while holding the rest fixed. The order matters because tightening one
//!    category can use up slack another needed.
//! 3. **Final solve** with the map whose mean tolerance was lowest.

use std::fmt;

use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;

use crate::builder::{InvestMode, Rebalance, RebalanceOutcome, is_feasible, solve_rebalance};
use crate::error::{Error, Result};
use crate::model::{self, Account, CategoryGroup};
use crate::search::{binary_search, search_tolerance};
use crate::solver::LpSolver;
use crate::tolerance::Tolerances;

/// Calibration parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationConfig {
    /// Bisection stops once the bracket is this narrow, in percent.
    pub epsilon: f64,
    /// Random category orders to try after the global pass.
    pub trials: usize,
    pub mode: InvestMode,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            trials: 100,
            mode: InvestMode::FullyInvested,
        }
    }
}

/// Result of a successful calibration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Calibration {
    pub global_tolerance: f64,
    pub tolerances: Tolerances,
    pub mean_tolerance: f64,
    /// Orders actually searched.
    pub trials_run: usize,
    /// Orders drawn again after already being searched.
    pub trials_skipped: usize,
    /// Feasibility solves issued, excluding the final solve.
    pub probes: usize,
    pub rebalance: Rebalance,
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CALIBRATION:")?;
        writeln!(f, "  Global tolerance: {:.4}%", self.global_tolerance)?;
        writeln!(f, "  Mean tolerance:   {:.4}%", self.mean_tolerance)?;
        writeln!(
            f,
            "  Trials:           {} run, {} repeated",
            self.trials_run, self.trials_skipped
        )?;
        writeln!(f, "  Probes:           {}", self.probes)?;
        writeln!(f, "  Tolerances:       {}", self.tolerances)?;
        writeln!(f, "  Yearly fees:      ${:.2}", self.rebalance.yearly_expense)
    }
}

/// Drives the search over a solver with an injected random source.
pub struct Calibrator<S, R> {
    solver: S,
    rng: R,
    config: CalibrationConfig,
    probes: usize,
}

impl<S: LpSolver, R: Rng> Calibrator<S, R> {
    pub fn new(solver: S, rng: R, config: CalibrationConfig) -> Self {
        Self {
            solver,
            rng,
            config,
            probes: 0,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    /// Calibrate and solve. Expects inputs that already passed validation.
    pub fn calibrate(
        &mut self,
        accounts: &[Account],
        groups: &[CategoryGroup],
    ) -> Result<Calibration> {
        let global = self.global_pass(accounts, groups)?;
        self.refine(accounts, groups, global)
    }

    /// Bisect one tolerance shared by every category. Resets the probe
    /// count.
    pub fn global_pass(&mut self, accounts: &[Account], groups: &[CategoryGroup]) -> Result<f64> {
        self.probes = 0;
        let epsilon = self.config.epsilon;
        let mut failure = None;

        let global = search_tolerance(epsilon, |t| {
            self.probe(accounts, groups, &Tolerances::uniform(groups, t), &mut failure)
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }
        let global = global.ok_or(Error::CalibrationExhausted { epsilon })?;
        info!("Global tolerance: {global:.4}%");
        Ok(global)
    }

    /// Per-category refinement starting from `global`, then the final solve.
    pub fn refine(
        &mut self,
        accounts: &[Account],
        groups: &[CategoryGroup],
        global: f64,
    ) -> Result<Calibration> {
        let epsilon = self.config.epsilon;
        let mut failure = None;

        let start = Tolerances::uniform(groups, global);
        let names: Vec<String> = model::categories(groups)
            .map(|c| c.name().to_string())
            .collect();
        let mut seen: FxHashSet<Vec<usize>> = FxHashSet::default();
        let mut best = start.clone();
        let mut best_mean = best.mean();
        let (mut trials_run, mut trials_skipped) = (0, 0);

        for trial in 0..self.config.trials {
            let mut order: Vec<usize> = (0..names.len()).collect();
            order.shuffle(&mut self.rng);
            if !seen.insert(order.clone()) {
                trials_skipped += 1;
                continue;
            }
            trials_run += 1;

            let mut working = start.clone();
            for &i in &order {
                let name = &names[i];
                let current = working.get(name).unwrap_or(global);
                let found = binary_search(0.0, current, epsilon, |t| {
                    let mut candidate = working.clone();
                    candidate.set(name.as_str(), t);
                    self.probe(accounts, groups, &candidate, &mut failure)
                });
                if let Some(err) = failure.take() {
                    return Err(err);
                }
                if let Some(t) = found {
                    working.set(name.as_str(), t);
                }
            }

            let mean = working.mean();
            debug!("trial {trial}: mean {mean:.4}% [{working}]");
            if mean < best_mean {
                info!("New lowest mean tolerance: {mean:.4}%");
                best_mean = mean;
                best = working;
            }
        }

        let rebalance = match solve_rebalance(
            &mut self.solver,
            accounts,
            groups,
            &best,
            self.config.mode,
        )? {
            RebalanceOutcome::Solved(r) => r,
            RebalanceOutcome::NoSolution(status) => return Err(Error::FinalSolveFailed(status)),
        };
        info!(
            "Calibrated to mean {best_mean:.4}% after {trials_run} orders, {} probes",
            self.probes
        );

        Ok(Calibration {
            global_tolerance: global,
            tolerances: best,
            mean_tolerance: best_mean,
            trials_run,
            trials_skipped,
            probes: self.probes,
            rebalance,
        })
    }

    /// One feasibility solve. Builder errors are parked in `failure` and
    /// turn every later probe into a no-op.
    fn probe(
        &mut self,
        accounts: &[Account],
        groups: &[CategoryGroup],
        tolerances: &Tolerances,
        failure: &mut Option<Error>,
    ) -> bool {
        if failure.is_some() {
            return false;
        }
        self.probes += 1;
        match is_feasible(&mut self.solver, accounts, groups, tolerances, self.config.mode) {
            Ok(feasible) => feasible,
            Err(err) => {
                *failure = Some(err);
                false
            }
        }
    }
}

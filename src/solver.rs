//! Solver capability and the built-in dense simplex engine.
//!
//! The builder and calibration code only talk to [`LpSolver`], so tests can
//! swap in a deterministic fake. [`SimplexSolver`] is a small two-phase primal
//! simplex that is plenty for portfolio-sized problems (tens of variables).
//! It is deterministic and safety-first:
//! - malformed input returns `Abnormal` instead of panicking,
//! - infeasible or unbounded problems return a status, never an error,
//! - Bland's rule guarantees termination on degenerate problems.

use log::trace;

use crate::lp::{LinearProgram, Sense, Solution, SolveStatus};

/// Anything that can solve a [`LinearProgram`].
pub trait LpSolver {
    fn solve(&mut self, lp: &LinearProgram) -> Solution;
}

impl<S: LpSolver + ?Sized> LpSolver for &mut S {
    fn solve(&mut self, lp: &LinearProgram) -> Solution {
        (**self).solve(lp)
    }
}

impl<S: LpSolver + ?Sized> LpSolver for Box<S> {
    fn solve(&mut self, lp: &LinearProgram) -> Solution {
        (**self).solve(lp)
    }
}

/// Pivot and reduced-cost threshold.
const EPS: f64 = 1e-9;
/// Relative residual above which a problem is declared infeasible.
const FEAS_TOL: f64 = 1e-9;
/// Bounds closer than this are treated as an equality.
const EQ_TOL: f64 = 1e-12;

/// Absolute slack allowed on a row with the given (possibly infinite) bounds.
fn feasibility_tolerance(lo: f64, hi: f64) -> f64 {
    let scale = [lo, hi]
        .iter()
        .filter(|b| b.is_finite())
        .fold(1.0_f64, |acc, b| acc.max(b.abs()));
    FEAS_TOL * scale
}

/// Dense two-phase primal simplex.
#[derive(Clone, Debug)]
pub struct SimplexSolver {
    max_iterations: usize,
    iterations: usize,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self {
            max_iterations: 50_000,
            iterations: 0,
        }
    }

    /// Cap the number of pivots per solve (reported as `NotSolved` when hit).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Pivots performed by the last solve.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl LpSolver for SimplexSolver {
    fn solve(&mut self, lp: &LinearProgram) -> Solution {
        self.iterations = 0;
        let Some(standard) = StandardForm::from_program(lp) else {
            return Solution::without_values(SolveStatus::Abnormal);
        };
        if standard.trivially_infeasible {
            return Solution::without_values(SolveStatus::Infeasible);
        }

        let mut tableau = Tableau::new(&standard);
        let status = tableau.run(&standard, self.max_iterations, &mut self.iterations);
        trace!(
            "simplex: {} rows, {} cols, {} pivots -> {status}",
            standard.rows.len(),
            standard.num_structural,
            self.iterations
        );
        if status != SolveStatus::Optimal {
            return Solution::without_values(status);
        }

        let values = standard.recover(&tableau.structural_values(standard.num_structural));
        Solution {
            status,
            objective_value: lp.objective_value(&values),
            values,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowKind {
    Le,
    Ge,
    Eq,
}

#[derive(Clone, Debug)]
struct Row {
    coefs: Vec<f64>,
    kind: RowKind,
    rhs: f64,
}

/// The program rewritten over shifted, non-negative variables `y = x - lower`.
///
/// Fixed variables are folded into the constant side of every row.
#[derive(Debug)]
struct StandardForm {
    /// For each original variable: `Some(column)` if free to move, `None` if fixed.
    column_of: Vec<Option<usize>>,
    lower: Vec<f64>,
    num_structural: usize,
    rows: Vec<Row>,
    /// Minimization costs over structural columns.
    costs: Vec<f64>,
    trivially_infeasible: bool,
}

impl StandardForm {
    fn from_program(lp: &LinearProgram) -> Option<Self> {
        let vars = lp.variables();
        let mut column_of = Vec::with_capacity(vars.len());
        let mut lower = Vec::with_capacity(vars.len());
        let mut num_structural = 0;
        let mut trivially_infeasible = false;

        for v in vars {
            if !v.lower.is_finite() || v.upper.is_nan() {
                return None;
            }
            if v.upper < v.lower - EQ_TOL {
                trivially_infeasible = true;
            }
            lower.push(v.lower);
            if v.upper - v.lower <= EQ_TOL {
                column_of.push(None);
            } else {
                column_of.push(Some(num_structural));
                num_structural += 1;
            }
        }

        let mut rows = Vec::new();

        // Finite upper bounds become explicit rows.
        for (i, v) in vars.iter().enumerate() {
            if let Some(col) = column_of[i] {
                if v.upper.is_finite() {
                    let mut coefs = vec![0.0; num_structural];
                    coefs[col] = 1.0;
                    rows.push(Row {
                        coefs,
                        kind: RowKind::Le,
                        rhs: v.upper - v.lower,
                    });
                }
            }
        }

        for c in lp.constraints() {
            if c.lower.is_nan() || c.upper.is_nan() {
                return None;
            }
            let mut coefs = vec![0.0; num_structural];
            let mut constant = 0.0;
            for &(id, coef) in &c.terms {
                if !coef.is_finite() || id.0 >= vars.len() {
                    return None;
                }
                constant += coef * lower[id.0];
                if let Some(col) = column_of[id.0] {
                    coefs[col] += coef;
                }
            }
            let lo = c.lower - constant;
            let hi = c.upper - constant;
            let tol = feasibility_tolerance(lo, hi);
            if lo > hi + tol {
                trivially_infeasible = true;
                continue;
            }

            if coefs.iter().all(|a| a.abs() <= EPS) {
                // Only fixed variables: the row is a constant check.
                if lo > tol || hi < -tol {
                    trivially_infeasible = true;
                }
                continue;
            }

            if lo.is_finite() && hi.is_finite() && (hi - lo).abs() <= EQ_TOL * hi.abs().max(1.0) {
                rows.push(Row {
                    coefs,
                    kind: RowKind::Eq,
                    rhs: hi,
                });
                continue;
            }
            if hi.is_finite() {
                rows.push(Row {
                    coefs: coefs.clone(),
                    kind: RowKind::Le,
                    rhs: hi,
                });
            }
            if lo.is_finite() {
                rows.push(Row {
                    coefs,
                    kind: RowKind::Ge,
                    rhs: lo,
                });
            }
        }

        // Normalize to non-negative right-hand sides.
        for row in &mut rows {
            if row.rhs < 0.0 {
                row.rhs = -row.rhs;
                for a in &mut row.coefs {
                    *a = -*a;
                }
                row.kind = match row.kind {
                    RowKind::Le => RowKind::Ge,
                    RowKind::Ge => RowKind::Le,
                    RowKind::Eq => RowKind::Eq,
                };
            }
        }

        let sign = match lp.objective().sense {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        let mut costs = vec![0.0; num_structural];
        for &(id, coef) in &lp.objective().terms {
            if !coef.is_finite() || id.0 >= vars.len() {
                return None;
            }
            if let Some(col) = column_of[id.0] {
                costs[col] += sign * coef;
            }
        }

        Some(Self {
            column_of,
            lower,
            num_structural,
            rows,
            costs,
            trivially_infeasible,
        })
    }

    /// Map structural column values back onto the original variables.
    fn recover(&self, structural: &[f64]) -> Vec<f64> {
        self.column_of
            .iter()
            .zip(&self.lower)
            .map(|(col, lo)| match col {
                Some(c) => lo + structural[*c].max(0.0),
                None => *lo,
            })
            .collect()
    }
}

/// Dense tableau: `m` constraint rows, each `[coefs | rhs]`, plus a basis.
struct Tableau {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    num_cols: usize,
    /// First artificial column; artificials occupy `artificial_start..num_cols`.
    artificial_start: usize,
    scale: f64,
}

impl Tableau {
    fn new(sf: &StandardForm) -> Self {
        let m = sf.rows.len();
        let n = sf.num_structural;
        let num_slack = sf.rows.iter().filter(|r| r.kind != RowKind::Eq).count();
        let num_art = sf.rows.iter().filter(|r| r.kind != RowKind::Le).count();
        let artificial_start = n + num_slack;
        let num_cols = artificial_start + num_art;

        let mut rows = Vec::with_capacity(m);
        let mut basis = Vec::with_capacity(m);
        let mut next_slack = n;
        let mut next_art = artificial_start;
        let mut scale = 1.0_f64;

        for r in &sf.rows {
            let mut row = vec![0.0; num_cols + 1];
            row[..n].copy_from_slice(&r.coefs);
            row[num_cols] = r.rhs;
            scale = scale.max(r.rhs.abs());
            match r.kind {
                RowKind::Le => {
                    row[next_slack] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                RowKind::Ge => {
                    row[next_slack] = -1.0;
                    next_slack += 1;
                    row[next_art] = 1.0;
                    basis.push(next_art);
                    next_art += 1;
                }
                RowKind::Eq => {
                    row[next_art] = 1.0;
                    basis.push(next_art);
                    next_art += 1;
                }
            }
            rows.push(row);
        }

        Self {
            rows,
            basis,
            num_cols,
            artificial_start,
            scale,
        }
    }

    fn run(&mut self, sf: &StandardForm, max_iter: usize, iterations: &mut usize) -> SolveStatus {
        // Phase 1: minimize the sum of artificials.
        if self.artificial_start < self.num_cols {
            let mut phase1 = vec![0.0; self.num_cols];
            for c in phase1.iter_mut().skip(self.artificial_start) {
                *c = 1.0;
            }
            let mut obj = self.reduced_costs(&phase1);
            match self.optimize(&mut obj, self.num_cols, max_iter, iterations) {
                SolveStatus::Optimal => {}
                // Phase 1 is bounded below by zero; anything else is a breakdown.
                SolveStatus::Unbounded => return SolveStatus::Abnormal,
                other => return other,
            }
            let residual = -obj[self.num_cols];
            if residual > FEAS_TOL * self.scale {
                return SolveStatus::Infeasible;
            }
            self.drive_out_artificials();
        }

        // Phase 2: the real objective, artificials barred from entering.
        let mut costs = vec![0.0; self.num_cols];
        costs[..sf.num_structural].copy_from_slice(&sf.costs);
        let mut obj = self.reduced_costs(&costs);
        self.optimize(&mut obj, self.artificial_start, max_iter, iterations)
    }

    /// Objective row `[c_j - c_B·B⁻¹A_j | -c_B·b]` for the current basis.
    fn reduced_costs(&self, costs: &[f64]) -> Vec<f64> {
        let mut obj = vec![0.0; self.num_cols + 1];
        obj[..self.num_cols].copy_from_slice(costs);
        for (row, &b) in self.rows.iter().zip(&self.basis) {
            let cb = costs[b];
            if cb != 0.0 {
                for (o, a) in obj.iter_mut().zip(row) {
                    *o -= cb * a;
                }
            }
        }
        obj
    }

    /// Primal simplex with Bland's rule over columns `0..enter_limit`.
    fn optimize(
        &mut self,
        obj: &mut [f64],
        enter_limit: usize,
        max_iter: usize,
        iterations: &mut usize,
    ) -> SolveStatus {
        loop {
            let Some(col) = (0..enter_limit).find(|&j| obj[j] < -EPS) else {
                return SolveStatus::Optimal;
            };

            let rhs = self.num_cols;
            let mut pivot: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let a = row[col];
                if a > EPS {
                    let ratio = row[rhs] / a;
                    pivot = match pivot {
                        None => Some((i, ratio)),
                        Some((best, best_ratio)) => {
                            if ratio < best_ratio - EPS
                                || ((ratio - best_ratio).abs() <= EPS
                                    && self.basis[i] < self.basis[best])
                            {
                                Some((i, ratio))
                            } else {
                                Some((best, best_ratio))
                            }
                        }
                    };
                }
            }
            let Some((prow, _)) = pivot else {
                return SolveStatus::Unbounded;
            };

            if *iterations >= max_iter {
                return SolveStatus::NotSolved;
            }
            *iterations += 1;
            self.pivot(prow, col, obj);
        }
    }

    fn pivot(&mut self, prow: usize, col: usize, obj: &mut [f64]) {
        let p = self.rows[prow][col];
        for a in self.rows[prow].iter_mut() {
            *a /= p;
        }
        let pivot_row = self.rows[prow].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == prow {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                for (a, pr) in row.iter_mut().zip(&pivot_row) {
                    *a -= factor * pr;
                }
            }
        }
        let factor = obj[col];
        if factor != 0.0 {
            for (o, pr) in obj.iter_mut().zip(&pivot_row) {
                *o -= factor * pr;
            }
        }
        self.basis[prow] = col;
    }

    /// Replace zero-valued basic artificials by structural or slack columns.
    ///
    /// Rows where no such column exists are redundant and keep their
    /// artificial at zero.
    fn drive_out_artificials(&mut self) {
        let mut scratch = vec![0.0; self.num_cols + 1];
        for i in 0..self.rows.len() {
            if self.basis[i] < self.artificial_start {
                continue;
            }
            if let Some(col) =
                (0..self.artificial_start).find(|&j| self.rows[i][j].abs() > EPS)
            {
                self.pivot(i, col, &mut scratch);
            }
        }
    }

    fn structural_values(&self, n: usize) -> Vec<f64> {
        let mut values = vec![0.0; n];
        for (row, &b) in self.rows.iter().zip(&self.basis) {
            if b < n {
                values[b] = row[self.num_cols];
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(got: f64, expected: f64) {
        assert!((got - expected).abs() < 1e-6, "got={got} expected={expected}");
    }

    #[test]
    fn textbook_maximization() {
        // max 3x + 5y  s.t. x <= 4, 2y <= 12, 3x + 2y <= 18  => (2, 6), 36
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        let y = lp.add_variable("y", 0.0, f64::INFINITY);
        lp.add_constraint("c1", f64::NEG_INFINITY, 4.0, vec![(x, 1.0)]);
        lp.add_constraint("c2", f64::NEG_INFINITY, 12.0, vec![(y, 2.0)]);
        lp.add_constraint("c3", f64::NEG_INFINITY, 18.0, vec![(x, 3.0), (y, 2.0)]);
        lp.set_objective(Sense::Maximize, vec![(x, 3.0), (y, 5.0)]);

        let sol = SimplexSolver::new().solve(&lp);
        assert_eq!(sol.status, SolveStatus::Optimal);
        assert_close(sol.value(x), 2.0);
        assert_close(sol.value(y), 6.0);
        assert_close(sol.objective_value, 36.0);
    }

    #[test]
    fn equality_and_lower_bounds() {
        // min x + 2y  s.t. x + y = 10, x >= 3, y >= 1, x <= 6  => x = 6, y = 4
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 3.0, 6.0);
        let y = lp.add_variable("y", 1.0, f64::INFINITY);
        lp.add_constraint("sum", 10.0, 10.0, vec![(x, 1.0), (y, 1.0)]);
        lp.set_objective(Sense::Minimize, vec![(x, 1.0), (y, 2.0)]);

        let sol = SimplexSolver::new().solve(&lp);
        assert!(sol.is_optimal());
        assert_close(sol.value(x), 6.0);
        assert_close(sol.value(y), 4.0);
    }

    #[test]
    fn ranged_constraint() {
        // min x  s.t. 2 <= x + y <= 5, y <= 1  => x = 1
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        let y = lp.add_variable("y", 0.0, 1.0);
        lp.add_constraint("r", 2.0, 5.0, vec![(x, 1.0), (y, 1.0)]);
        lp.set_objective(Sense::Minimize, vec![(x, 1.0)]);

        let sol = SimplexSolver::new().solve(&lp);
        assert!(sol.is_optimal());
        assert_close(sol.value(x), 1.0);
        assert_close(sol.value(y), 1.0);
    }

    #[test]
    fn fixed_variable_is_exact() {
        let mut lp = LinearProgram::new();
        let locked = lp.add_variable("locked", 200.0, 200.0);
        let free = lp.add_variable("free", 0.0, f64::INFINITY);
        lp.add_constraint("acct", 1000.0, 1000.0, vec![(locked, 1.0), (free, 1.0)]);
        lp.set_objective(Sense::Minimize, vec![(locked, 0.5), (free, 0.1)]);

        let sol = SimplexSolver::new().solve(&lp);
        assert!(sol.is_optimal());
        assert_eq!(sol.value(locked), 200.0);
        assert_close(sol.value(free), 800.0);
    }

    #[test]
    fn redundant_equalities_are_fine() {
        // x + y = 1000, x = 500, y = 500 (third row implied by the others)
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        let y = lp.add_variable("y", 0.0, f64::INFINITY);
        lp.add_constraint("acct", 1000.0, 1000.0, vec![(x, 1.0), (y, 1.0)]);
        lp.add_constraint("X", 500.0, 500.0, vec![(x, 1.0)]);
        lp.add_constraint("Y", 500.0, 500.0, vec![(y, 1.0)]);

        let sol = SimplexSolver::new().solve(&lp);
        assert!(sol.is_optimal());
        assert_close(sol.value(x), 500.0);
        assert_close(sol.value(y), 500.0);
    }

    #[test]
    fn detects_infeasible() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        lp.add_constraint("lo", 10.0, f64::INFINITY, vec![(x, 1.0)]);
        lp.add_constraint("hi", f64::NEG_INFINITY, 5.0, vec![(x, 1.0)]);

        let sol = SimplexSolver::new().solve(&lp);
        assert_eq!(sol.status, SolveStatus::Infeasible);
        assert!(sol.values.is_empty());
    }

    #[test]
    fn detects_unbounded() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        lp.set_objective(Sense::Maximize, vec![(x, 1.0)]);
        assert_eq!(SimplexSolver::new().solve(&lp).status, SolveStatus::Unbounded);
    }

    #[test]
    fn fixed_only_row_checked_as_constant() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 200.0, 200.0);
        lp.add_constraint("cap", f64::NEG_INFINITY, 100.0, vec![(x, 1.0)]);
        assert_eq!(SimplexSolver::new().solve(&lp).status, SolveStatus::Infeasible);
    }

    #[test]
    fn nan_input_is_abnormal() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        lp.add_constraint("bad", 0.0, 1.0, vec![(x, f64::NAN)]);
        assert_eq!(SimplexSolver::new().solve(&lp).status, SolveStatus::Abnormal);
    }

    #[test]
    fn iteration_cap_reports_not_solved() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable("x", 0.0, f64::INFINITY);
        let y = lp.add_variable("y", 0.0, f64::INFINITY);
        lp.add_constraint("a", 1.0, f64::INFINITY, vec![(x, 1.0)]);
        lp.add_constraint("b", 1.0, f64::INFINITY, vec![(y, 1.0)]);
        let mut solver = SimplexSolver::new().with_max_iterations(1);
        assert_eq!(solver.solve(&lp).status, SolveStatus::NotSolved);
    }

    #[test]
    fn empty_program_is_optimal() {
        let sol = SimplexSolver::new().solve(&LinearProgram::new());
        assert!(sol.is_optimal());
        assert!(sol.values.is_empty());
    }
}

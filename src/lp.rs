//! Linear programs handed to an [`LpSolver`](crate::LpSolver).
//!
//! A program is a list of bounded continuous variables, a list of ranged
//! linear constraints, and a linear objective. Everything is stored in
//! insertion order so two programs built from the same inputs compare equal.

use std::fmt;

/// Index of a variable inside its [`LinearProgram`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// A continuous decision variable with bounds `lower <= x <= upper`.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub lower: f64,
    /// `f64::INFINITY` when unbounded above.
    pub upper: f64,
}

/// A ranged linear constraint `lower <= Σ coef·x <= upper`.
///
/// Either bound may be infinite.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub terms: Vec<(VarId, f64)>,
}

/// Objective direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// Linear objective `Σ coef·x`, minimized or maximized.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Objective {
    pub sense: Sense,
    pub terms: Vec<(VarId, f64)>,
}

/// A complete linear program.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LinearProgram {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl LinearProgram {
    /// Create an empty minimization problem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable and return its id.
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
        });
        id
    }

    /// Add a ranged constraint.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: f64,
        terms: Vec<(VarId, f64)>,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            lower,
            upper,
            terms,
        });
    }

    /// Replace the objective.
    pub fn set_objective(&mut self, sense: Sense, terms: Vec<(VarId, f64)>) {
        self.objective = Objective { sense, terms };
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Evaluate the objective at `values` (one entry per variable).
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .terms
            .iter()
            .map(|(id, coef)| coef * values.get(id.0).copied().unwrap_or(0.0))
            .sum()
    }
}

/// Outcome of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// The engine stopped before reaching a conclusion (e.g. iteration cap).
    NotSolved,
    /// Malformed input or numerical breakdown.
    Abnormal,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolveStatus::Unbounded => write!(f, "UNBOUNDED"),
            SolveStatus::NotSolved => write!(f, "NOT_SOLVED"),
            SolveStatus::Abnormal => write!(f, "ABNORMAL"),
        }
    }
}

/// Status plus, when optimal, one value per variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    pub objective_value: f64,
}

impl Solution {
    /// A non-optimal result carrying no values.
    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: 0.0,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Solved value of `id`, or 0 when absent.
    pub fn value(&self, id: VarId) -> f64 {
        self.values.get(id.0).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let mut lp = LinearProgram::new();
        let a = lp.add_variable("a", 0.0, f64::INFINITY);
        let b = lp.add_variable("b", 1.0, 1.0);
        assert_eq!(a, VarId(0));
        assert_eq!(b, VarId(1));
        assert_eq!(lp.num_variables(), 2);
        assert_eq!(lp.variables()[1].lower, 1.0);
    }

    #[test]
    fn objective_value_sums_terms() {
        let mut lp = LinearProgram::new();
        let a = lp.add_variable("a", 0.0, 10.0);
        let b = lp.add_variable("b", 0.0, 10.0);
        lp.set_objective(Sense::Maximize, vec![(a, 2.0), (b, 0.5)]);
        assert_eq!(lp.objective().sense, Sense::Maximize);
        assert_eq!(lp.objective_value(&[3.0, 4.0]), 8.0);
    }

    #[test]
    fn default_is_empty_minimization() {
        let lp = LinearProgram::default();
        assert_eq!(lp.num_constraints(), 0);
        assert_eq!(lp.objective().sense, Sense::Minimize);
    }

    #[test]
    fn status_display() {
        assert_eq!(SolveStatus::Infeasible.to_string(), "INFEASIBLE");
        assert_eq!(SolveStatus::NotSolved.to_string(), "NOT_SOLVED");
    }

    #[test]
    fn missing_value_is_zero() {
        let s = Solution::without_values(SolveStatus::Infeasible);
        assert!(!s.is_optimal());
        assert_eq!(s.value(VarId(3)), 0.0);
    }
}

//! Error types for the rebalancer.

use std::path::PathBuf;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("portfolio file error: {0}")]
    Portfolio(String),

    #[error("failed to read portfolio file {path}: {source}")]
    PortfolioRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse portfolio JSON: {0}")]
    PortfolioParse(#[from] serde_json::Error),

    #[error(transparent)]
    Solver(#[from] stocksolver::Error),

    #[error("no rebalance at {tolerance}% tolerance: solver returned {status}")]
    NoSolution {
        tolerance: f64,
        status: stocksolver::SolveStatus,
    },

    #[error("failed to write plan {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

impl Error {
    /// The portfolio itself can't be rebalanced (as opposed to an I/O or
    /// input-format problem).
    pub fn is_infeasible(&self) -> bool {
        match self {
            Error::Solver(e) => {
                e.is_validation()
                    || matches!(
                        e,
                        stocksolver::Error::CalibrationExhausted { .. }
                            | stocksolver::Error::FinalSolveFailed(_)
                    )
            }
            Error::NoSolution { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infeasible_classification() {
        let exhausted: Error = stocksolver::Error::CalibrationExhausted { epsilon: 0.01 }.into();
        assert!(exhausted.is_infeasible());

        let bad_input: Error = stocksolver::Error::InvalidPortfolio("dup".into()).into();
        assert!(!bad_input.is_infeasible());

        assert!(!Error::Aborted("no".into()).is_infeasible());
        assert!(
            Error::NoSolution {
                tolerance: 1.0,
                status: stocksolver::SolveStatus::Infeasible
            }
            .is_infeasible()
        );
    }

    #[test]
    fn solver_errors_display_transparently() {
        let e: Error = stocksolver::Error::MissingTolerance("BONDS".into()).into();
        assert_eq!(e.to_string(), "no tolerance given for category BONDS");
    }
}

//! stocksolver-rebalancer: command-line front end for stocksolver.
//!
//! Reads a portfolio (stocks, category targets, holdings) from a JSON file,
//! checks that it can be rebalanced at all, calibrates per-category
//! tolerances, and prints the resulting plan with an audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod execution;
pub mod portfolio;
pub mod report;

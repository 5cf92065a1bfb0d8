//! Integration tests for the rebalancer workflow: portfolio file in,
//! calibration, plan file and audit trail out.

use std::path::Path;

use chrono::NaiveDate;
use stocksolver::{InvestMode, Portfolio};
use stocksolver_rebalancer::config::Config;
use stocksolver_rebalancer::error::Error;
use stocksolver_rebalancer::execution::{self, RunOptions};
use stocksolver_rebalancer::portfolio::PortfolioFile;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn two_fund_json() -> &'static str {
    r#"{
        "stocks": [
            { "ticker": "BND", "expense_ratio": 0.03, "allocation": { "BONDS": 100 } },
            { "ticker": "VTI", "expense_ratio": 0.03, "allocation": { "STOCKS": 100 } }
        ],
        "allocations": [
            { "category": "BONDS", "percent": 40 },
            { "category": "STOCKS", "percent": 60 }
        ],
        "holdings": [
            { "account": "IRA", "ticker": "BND", "current_value": 1000 },
            { "account": "IRA", "ticker": "VTI", "current_value": 9000 }
        ]
    }"#
}

fn portfolio(json: &str) -> Portfolio {
    PortfolioFile::from_json(json)
        .unwrap()
        .into_portfolio(today())
        .unwrap()
}

fn config_in(dir: &Path, extra: &str) -> Config {
    let toml = format!(
        "[calibration]\ntrials = 3\nseed = 11\n{extra}\n[logging]\ndir = '{}'\n",
        dir.display()
    );
    Config::from_toml(&toml).unwrap()
}

fn audit_events(config: &Config) -> Vec<serde_json::Value> {
    std::fs::read_to_string(config.audit_path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ============================================================================
// Option resolution
// ============================================================================

#[test]
fn cli_seed_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "");
    let opts = RunOptions {
        seed: Some(99),
        ..RunOptions::default()
    };
    assert_eq!(execution::resolve_seed(&config, &opts), 99);
    assert_eq!(execution::resolve_seed(&config, &RunOptions::default()), 11);
}

#[test]
fn cli_trials_override_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "");
    let opts = RunOptions {
        trials: Some(0),
        ..RunOptions::default()
    };
    assert_eq!(execution::effective_calibration(&config, &opts).trials, 1);
    assert_eq!(
        execution::effective_calibration(&config, &RunOptions::default()).trials,
        3
    );
}

// ============================================================================
// Single solve
// ============================================================================

#[test]
fn solve_at_zero_tolerance_hits_targets() {
    let p = portfolio(two_fund_json());
    let r = execution::solve_at(&p, 0.0, InvestMode::FullyInvested).unwrap();
    let ira = &r.accounts[0];
    assert!((ira.holding("BND").unwrap().current_value() - 4000.0).abs() < 1e-6);
    assert!((ira.holding("VTI").unwrap().current_value() - 6000.0).abs() < 1e-6);
}

#[test]
fn solve_at_reports_no_solution() {
    // The locked VTI pins STOCKS at 90%, far outside a 1% band around 60%.
    let json = two_fund_json().replace(
        "\"current_value\": 9000 }",
        "\"current_value\": 9000, \"locked\": true }",
    );
    let p = portfolio(&json);
    let err = execution::solve_at(&p, 1.0, InvestMode::FullyInvested).unwrap_err();
    assert!(matches!(err, Error::NoSolution { tolerance, .. } if tolerance == 1.0));
    assert!(err.is_infeasible());
}

// ============================================================================
// Full run
// ============================================================================

#[test]
fn run_writes_plan_and_audit() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "");
    let p = portfolio(two_fund_json());
    let plan_path = dir.path().join("out").join("plan.json");
    let opts = RunOptions {
        output: Some(plan_path.clone()),
        portfolio_file: "two_fund.json".into(),
        ..RunOptions::default()
    };

    let calibration = execution::run(&config, &p, &opts).unwrap();
    assert!(calibration.global_tolerance < 0.01 + 1e-9);
    let bnd = calibration.rebalance.accounts[0].holding("BND").unwrap();
    assert!((bnd.current_value() - 4000.0).abs() < 1.0);

    let plan: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&plan_path).unwrap()).unwrap();
    assert_eq!(plan["seed"], 11);
    assert!(plan["calibration"]["tolerances"]["BONDS"].is_number());
    let lines = plan["diff"]["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["ticker"], "BND");

    let events = audit_events(&config);
    let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "run_started",
            "validation_passed",
            "global_tolerance",
            "calibration_completed"
        ]
    );
    assert_eq!(events[0]["portfolio_file"], "two_fund.json");
    assert_eq!(events[0]["trials"], 3);
    assert_eq!(events[1]["total_value"], 10000.0);
    assert_eq!(events[2]["tolerance"], calibration.global_tolerance);
}

#[test]
fn run_with_force_overwrites_existing_plan() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "");
    let plan_path = dir.path().join("plan.json");
    std::fs::write(&plan_path, "stale").unwrap();

    let opts = RunOptions {
        output: Some(plan_path.clone()),
        force: true,
        ..RunOptions::default()
    };
    execution::run(&config, &portfolio(two_fund_json()), &opts).unwrap();

    let contents = std::fs::read_to_string(&plan_path).unwrap();
    assert!(contents.starts_with('{'));
}

#[test]
fn run_is_reproducible_with_seed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "");
    let p = portfolio(two_fund_json());
    let a = execution::run(&config, &p, &RunOptions::default()).unwrap();
    let b = execution::run(&config, &p, &RunOptions::default()).unwrap();
    assert_eq!(a.tolerances, b.tolerances);
    assert_eq!(a.probes, b.probes);
}

#[test]
fn run_maximize_mode_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "mode = \"maximize-invested\"");
    assert_eq!(config.calibration.mode, InvestMode::MaximizeInvested);

    let calibration =
        execution::run(&config, &portfolio(two_fund_json()), &RunOptions::default()).unwrap();
    assert!((calibration.rebalance.deployed - 10000.0).abs() < 1e-3);
}

#[test]
fn infeasible_run_logs_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "");
    // Nothing can hold STOCKS.
    let json = two_fund_json()
        .replace("{ \"STOCKS\": 100 }", "{ \"BONDS\": 100 }");
    let p = portfolio(&json);

    let err = execution::run(&config, &p, &RunOptions::default()).unwrap_err();
    assert!(err.is_infeasible());
    assert!(matches!(
        err,
        Error::Solver(stocksolver::Error::InsufficientCapacity { ref category, .. })
            if category == "STOCKS"
    ));

    let events = audit_events(&config);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["event"], "run_failed");
    assert_eq!(events[1]["infeasible"], true);
}

// ============================================================================
// Portfolio file
// ============================================================================

#[test]
fn load_portfolio_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portfolio.json");
    std::fs::write(&path, two_fund_json()).unwrap();

    let p = execution::load_portfolio(&path).unwrap();
    assert_eq!(p.total_value(), 10000.0);
    assert!(execution::run_validate(&p).is_ok());
    assert!(execution::show_current(&p).is_ok());
}

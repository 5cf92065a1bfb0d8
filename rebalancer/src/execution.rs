//! Execution orchestrator: load → validate → calibrate → report.
//!
//! This is the main workflow that ties together all components.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use stocksolver::{
    Calibration, CalibrationConfig, Calibrator, InvestMode, Portfolio, Rebalance,
    RebalanceOutcome, SimplexSolver, Tolerances, ValidationReport, solve_rebalance, validate,
};

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::portfolio::PortfolioFile;
use crate::report::{AllocationReport, DiffReport};

/// Options for a calibration run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub seed: Option<u64>,
    pub trials: Option<usize>,
    pub output: Option<PathBuf>,
    pub force: bool,
    pub portfolio_file: String,
}

/// What `run --output` writes.
#[derive(Debug, Serialize)]
pub struct Plan<'a> {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub calibration: &'a Calibration,
    pub diff: DiffReport,
}

/// Load a portfolio file, resolving `locked_until` dates against today.
pub fn load_portfolio(path: &Path) -> Result<Portfolio> {
    PortfolioFile::load(path)?.into_portfolio(Local::now().date_naive())
}

/// CLI seed, else config seed, else fresh entropy.
pub fn resolve_seed(config: &Config, opts: &RunOptions) -> u64 {
    opts.seed
        .or(config.calibration.seed)
        .unwrap_or_else(rand::random)
}

/// Calibration parameters with CLI overrides applied.
pub fn effective_calibration(config: &Config, opts: &RunOptions) -> CalibrationConfig {
    let mut cal = config.calibration_config();
    if let Some(trials) = opts.trials {
        cal.trials = trials.max(1);
    }
    cal
}

/// Print the current allocation against targets.
pub fn show_current(portfolio: &Portfolio) -> Result<()> {
    let report = AllocationReport::build(
        portfolio.accounts(),
        portfolio.category_groups(),
        portfolio.total_value(),
    );
    print!("{report}");
    Ok(())
}

/// Run the feasibility check and print its report.
pub fn run_validate(portfolio: &Portfolio) -> Result<ValidationReport> {
    let report = validate(portfolio.accounts(), portfolio.category_groups())?;
    print!("{report}");
    println!("\nPortfolio can be rebalanced.");
    Ok(report)
}

/// One solve at a uniform tolerance.
pub fn solve_at(portfolio: &Portfolio, tolerance: f64, mode: InvestMode) -> Result<Rebalance> {
    let groups = portfolio.category_groups();
    let tolerances = Tolerances::uniform(groups, tolerance);
    match solve_rebalance(
        &mut SimplexSolver::new(),
        portfolio.accounts(),
        groups,
        &tolerances,
        mode,
    )? {
        RebalanceOutcome::Solved(r) => Ok(r),
        RebalanceOutcome::NoSolution(status) => Err(Error::NoSolution { tolerance, status }),
    }
}

/// `solve` subcommand: solve once and print the diff.
pub fn run_solve(portfolio: &Portfolio, tolerance: f64, mode: InvestMode) -> Result<()> {
    let rebalance = solve_at(portfolio, tolerance, mode)?;
    print_outcome(portfolio, &rebalance);
    Ok(())
}

/// Execute a full calibration run.
pub fn run(config: &Config, portfolio: &Portfolio, opts: &RunOptions) -> Result<Calibration> {
    let seed = resolve_seed(config, opts);
    let cal = effective_calibration(config, opts);

    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, &opts.portfolio_file, seed, cal.trials)?;

    match calibrate(portfolio, cal, seed, opts, &mut audit) {
        Ok(calibration) => Ok(calibration),
        Err(e) => {
            audit::log_run_failed(&mut audit, &e)?;
            Err(e)
        }
    }
}

fn calibrate(
    portfolio: &Portfolio,
    cal: CalibrationConfig,
    seed: u64,
    opts: &RunOptions,
    audit: &mut AuditLog,
) -> Result<Calibration> {
    // 1. Feasibility
    let report = validate(portfolio.accounts(), portfolio.category_groups())?;
    print!("{report}");
    audit::log_validation_passed(audit, &report)?;

    // 2. Calibrate
    info!(
        "Calibrating: epsilon {}%, {} trials, seed {seed}",
        cal.epsilon, cal.trials
    );
    let (accounts, groups) = (portfolio.accounts(), portfolio.category_groups());
    let mut calibrator = Calibrator::new(SimplexSolver::new(), StdRng::seed_from_u64(seed), cal);
    let global = calibrator.global_pass(accounts, groups)?;
    audit::log_global_tolerance(audit, global)?;
    let calibration = calibrator.refine(accounts, groups, global)?;
    audit::log_calibration_completed(audit, &calibration)?;

    // 3. Report
    println!();
    print!("{calibration}");
    print_outcome(portfolio, &calibration.rebalance);

    // 4. Optional plan file
    if let Some(path) = &opts.output {
        let plan = Plan {
            generated_at: Utc::now(),
            seed,
            calibration: &calibration,
            diff: DiffReport::build(portfolio.accounts(), &calibration.rebalance.accounts),
        };
        if write_plan(path, &plan, opts.force)? {
            println!("\nPlan written to {}", path.display());
        }
    }

    Ok(calibration)
}

fn print_outcome(portfolio: &Portfolio, rebalance: &Rebalance) {
    println!();
    print!(
        "{}",
        DiffReport::build(portfolio.accounts(), &rebalance.accounts)
    );
    println!();
    print!(
        "{}",
        AllocationReport::build(
            &rebalance.accounts,
            portfolio.category_groups(),
            portfolio.total_value(),
        )
    );
    println!("\nYearly fees: ${:.2}", rebalance.yearly_expense);
}

/// Write `plan` as pretty JSON. An existing file is only replaced with
/// `force` or after confirmation; returns whether the file was written.
pub fn write_plan(path: &Path, plan: &Plan<'_>, force: bool) -> Result<bool> {
    if path.exists() && !force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", path.display()))
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;
        if !confirmed {
            warn!("Plan not written: {} left unchanged", path.display());
            return Ok(false);
        }
    }

    let output_err = |source: std::io::Error| Error::Output {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(plan)
        .map_err(|e| output_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(output_err)?;
    }
    std::fs::write(path, json).map_err(output_err)?;
    Ok(true)
}

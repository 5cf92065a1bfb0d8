//! CLI entry point for the stocksolver rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use stocksolver_rebalancer::config::Config;
use stocksolver_rebalancer::error::Error;
use stocksolver_rebalancer::execution::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Multi-account portfolio rebalancer: validate, calibrate, report")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current allocation against targets
    Current {
        /// Path to portfolio.json
        portfolio: PathBuf,
    },

    /// Check that the portfolio can be rebalanced at all
    Validate {
        /// Path to portfolio.json
        portfolio: PathBuf,
    },

    /// Solve once at a uniform tolerance
    Solve {
        /// Path to portfolio.json
        portfolio: PathBuf,

        /// Allowed deviation per category, percent of target
        #[arg(long)]
        tolerance: f64,
    },

    /// Validate, calibrate tolerances, and print the rebalance plan
    Run {
        /// Path to portfolio.json
        portfolio: PathBuf,

        /// RNG seed for category orders (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Refinement trials (overrides config)
        #[arg(long)]
        trials: Option<usize>,

        /// Write the plan as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite --output without asking
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::resolve(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let portfolio_path = match &cli.command {
        Command::Current { portfolio }
        | Command::Validate { portfolio }
        | Command::Solve { portfolio, .. }
        | Command::Run { portfolio, .. } => portfolio.clone(),
    };
    let portfolio = match execution::load_portfolio(&portfolio_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading portfolio: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Current { .. } => execution::show_current(&portfolio),
        Command::Validate { .. } => execution::run_validate(&portfolio).map(|_| ()),
        Command::Solve { tolerance, .. } => {
            execution::run_solve(&portfolio, tolerance, config.calibration.mode)
        }
        Command::Run {
            seed,
            trials,
            output,
            force,
            ..
        } => {
            let opts = RunOptions {
                seed,
                trials,
                output,
                force,
                portfolio_file: portfolio_path.display().to_string(),
            };
            execution::run(&config, &portfolio, &opts).map(|_| ())
        }
    };

    if let Err(e) = result {
        match &e {
            e if e.is_infeasible() => {
                eprintln!("\nNo rebalance possible: {e}");
                process::exit(2);
            }
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

//! JSONL audit trail logging.
//!
//! Each rebalancer run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stocksolver::{Calibration, ValidationReport};

use crate::error::{Error, Result};

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience: log a run start event.
pub fn log_run_started(
    audit: &mut AuditLog,
    portfolio_file: &str,
    seed: u64,
    trials: usize,
) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "portfolio_file": portfolio_file,
            "seed": seed,
            "trials": trials,
        }),
    )
}

/// Convenience: log a passed feasibility check.
pub fn log_validation_passed(audit: &mut AuditLog, report: &ValidationReport) -> Result<()> {
    let dependencies: Vec<_> = report
        .dependencies
        .iter()
        .map(|d| {
            serde_json::json!({
                "account": d.account,
                "category": d.category,
                "residual": d.residual,
            })
        })
        .collect();

    audit.log(
        "validation_passed",
        serde_json::json!({
            "total_value": report.total_value,
            "dependencies": dependencies,
            "breaches": report.breaches.len(),
        }),
    )
}

/// Convenience: log the global pass result. Written as soon as the global
/// pass ends, before per-category refinement starts.
pub fn log_global_tolerance(audit: &mut AuditLog, tolerance: f64) -> Result<()> {
    audit.log(
        "global_tolerance",
        serde_json::json!({ "tolerance": tolerance }),
    )
}

/// Convenience: log the calibrated tolerances and the resulting plan cost.
pub fn log_calibration_completed(audit: &mut AuditLog, calibration: &Calibration) -> Result<()> {
    let tolerances: serde_json::Map<String, serde_json::Value> = calibration
        .tolerances
        .iter()
        .map(|(category, pct)| (category.to_string(), serde_json::json!(pct)))
        .collect();

    audit.log(
        "calibration_completed",
        serde_json::json!({
            "tolerances": tolerances,
            "mean_tolerance": calibration.mean_tolerance,
            "trials_run": calibration.trials_run,
            "trials_skipped": calibration.trials_skipped,
            "probes": calibration.probes,
            "yearly_expense": calibration.rebalance.yearly_expense,
            "deployed": calibration.rebalance.deployed,
        }),
    )
}

/// Convenience: log a failed run.
pub fn log_run_failed(audit: &mut AuditLog, error: &Error) -> Result<()> {
    audit.log(
        "run_failed",
        serde_json::json!({
            "error": error.to_string(),
            "infeasible": error.is_infeasible(),
        }),
    )
}

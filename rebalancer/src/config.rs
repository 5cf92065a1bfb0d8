//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stocksolver::{CalibrationConfig, InvestMode};

use crate::error::{Error, Result};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calibration: CalibrationSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationSection {
    /// Bisection width, in percent.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default)]
    pub mode: InvestMode,
    /// Fixed RNG seed; drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            trials: default_trials(),
            mode: InvestMode::default(),
            seed: None,
        }
    }
}

fn default_epsilon() -> f64 {
    0.01
}
fn default_trials() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly given file, else `config.toml` if present, else
    /// defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        let epsilon = self.calibration.epsilon;
        if !(epsilon > 0.0 && epsilon < 100.0) {
            return Err(Error::Config("epsilon must be in (0, 100)".into()));
        }
        if self.calibration.trials == 0 {
            return Err(Error::Config("trials must be >= 1".into()));
        }
        if self.logging.audit_file.is_empty() {
            return Err(Error::Config("audit_file must not be empty".into()));
        }
        Ok(())
    }

    /// Calibration parameters for the core crate.
    pub fn calibration_config(&self) -> CalibrationConfig {
        CalibrationConfig {
            epsilon: self.calibration.epsilon,
            trials: self.calibration.trials,
            mode: self.calibration.mode,
        }
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

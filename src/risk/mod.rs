//! Risk model - states, modes, thresholds, smoothing and classification

mod classify;
mod smooth;

pub use classify::{classify, RiskAssessment, Trend};
pub use smooth::{smooth, SMOOTHING_ALPHA};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Operating mode selected by the operator; determines the active threshold set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Real traffic thresholds
    Production,
    /// Relaxed thresholds for demos and simulated sources
    Demo,
}

impl Mode {
    /// Lowercase display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Demo => "demo",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "demo" => Ok(Mode::Demo),
            other => bail!("unknown mode '{other}' (expected 'production' or 'demo')"),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete risk state, totally ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskState {
    /// Probability below the warning cutoff
    Healthy,
    /// Probability at or above the warning cutoff
    Warning,
    /// Probability at or above the critical cutoff
    Critical,
}

impl RiskState {
    /// Upper-case display name, matching the dashboard labels
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskState::Healthy => "HEALTHY",
            RiskState::Warning => "WARNING",
            RiskState::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warning/critical probability cutoffs for one mode.
///
/// Exact values are a policy choice, tuned per deployment via the config file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// At or above this probability the state is at least WARNING
    pub warning: f64,
    /// At or above this probability the state is CRITICAL
    pub critical: f64,
}

/// Default production cutoffs
pub const PRODUCTION_THRESHOLDS: ThresholdSet = ThresholdSet {
    warning: 0.15,
    critical: 0.70,
};

/// Default demo cutoffs
pub const DEMO_THRESHOLDS: ThresholdSet = ThresholdSet {
    warning: 0.10,
    critical: 0.50,
};

impl ThresholdSet {
    /// Check the `warning < critical` invariant and probability bounds
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.warning) || !(0.0..=1.0).contains(&self.critical) {
            bail!(
                "thresholds must lie in [0, 1]: warning={}, critical={}",
                self.warning,
                self.critical
            );
        }
        if self.warning >= self.critical {
            bail!(
                "warning threshold {} must be below critical threshold {}",
                self.warning,
                self.critical
            );
        }
        Ok(())
    }
}

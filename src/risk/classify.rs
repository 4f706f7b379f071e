// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Threshold classification with trend annotation

use serde::{Deserialize, Serialize};

use super::{RiskState, ThresholdSet};

/// Direction of the probability relative to the previous sample.
///
/// Presentation hint only; it never changes the severity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Probability increased since the previous sample
    Rising,
    /// Probability decreased since the previous sample
    Falling,
    /// Probability unchanged
    Flat,
    /// No previous sample to compare against
    Unknown,
}

/// Classification outcome: severity bucket plus trend annotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Severity bucket
    pub state: RiskState,
    /// Direction relative to the previous sample
    pub trend: Trend,
}

/// Map a probability to a risk state, first match wins.
///
/// CRITICAL dominates regardless of trend. Above the warning cutoff the
/// bucket holds even on a falling trend; downgrading a non-rising probability
/// to HEALTHY made the state flicker near the cutoff, so the classification
/// is monotonic in the probability.
pub fn classify(probability: f64, previous: Option<f64>, thresholds: &ThresholdSet) -> RiskAssessment {
    let state = if probability >= thresholds.critical {
        RiskState::Critical
    } else if probability >= thresholds.warning {
        RiskState::Warning
    } else {
        RiskState::Healthy
    };

    let trend = match previous {
        None => Trend::Unknown,
        Some(prev) if probability > prev => Trend::Rising,
        Some(prev) if probability < prev => Trend::Falling,
        Some(_) => Trend::Flat,
    };

    RiskAssessment { state, trend }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{DEMO_THRESHOLDS, PRODUCTION_THRESHOLDS};

    #[test]
    fn production_buckets() {
        let t = &PRODUCTION_THRESHOLDS;
        assert_eq!(classify(0.05, None, t).state, RiskState::Healthy);
        assert_eq!(classify(0.20, None, t).state, RiskState::Warning);
        assert_eq!(classify(0.75, None, t).state, RiskState::Critical);
    }

    #[test]
    fn cutoffs_are_inclusive() {
        let t = &PRODUCTION_THRESHOLDS;
        assert_eq!(classify(t.warning, None, t).state, RiskState::Warning);
        assert_eq!(classify(t.critical, None, t).state, RiskState::Critical);
    }

    #[test]
    fn mode_changes_classification_for_same_probability() {
        assert_eq!(
            classify(0.50, None, &DEMO_THRESHOLDS).state,
            RiskState::Critical
        );
        assert_eq!(
            classify(0.50, None, &PRODUCTION_THRESHOLDS).state,
            RiskState::Warning
        );
    }

    #[test]
    fn monotonic_in_probability() {
        for t in [&PRODUCTION_THRESHOLDS, &DEMO_THRESHOLDS] {
            let mut last = RiskState::Healthy;
            for step in 0..=100 {
                let p = step as f64 / 100.0;
                let state = classify(p, None, t).state;
                assert!(state >= last, "severity decreased at p={p}");
                last = state;
            }
        }
    }

    #[test]
    fn trend_never_changes_the_bucket() {
        let t = &PRODUCTION_THRESHOLDS;
        // Falling into the warning band must not downgrade to HEALTHY.
        let falling = classify(0.20, Some(0.90), t);
        let rising = classify(0.20, Some(0.05), t);
        let first = classify(0.20, None, t);
        assert_eq!(falling.state, RiskState::Warning);
        assert_eq!(falling.state, rising.state);
        assert_eq!(falling.state, first.state);
    }

    #[test]
    fn trend_annotation() {
        let t = &PRODUCTION_THRESHOLDS;
        assert_eq!(classify(0.3, Some(0.1), t).trend, Trend::Rising);
        assert_eq!(classify(0.1, Some(0.3), t).trend, Trend::Falling);
        assert_eq!(classify(0.3, Some(0.3), t).trend, Trend::Flat);
        assert_eq!(classify(0.3, None, t).trend, Trend::Unknown);
    }
}

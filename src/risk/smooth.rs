// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Exponential smoothing of the probability stream

/// Weight given to the newest reading.
///
/// A single-pole filter at this weight suppresses one-sample noise while
/// reacting within about two samples to a sustained shift, which is enough
/// for a 30-second polling cadence.
pub const SMOOTHING_ALPHA: f64 = 0.6;

/// Exponential moving average over successive readings.
///
/// The first sample of a session passes through unsmoothed; the caller holds
/// the running value between calls.
pub fn smooth(previous: Option<f64>, current: f64) -> f64 {
    match previous {
        Some(prev) => SMOOTHING_ALPHA * current + (1.0 - SMOOTHING_ALPHA) * prev,
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        for x in [0.0, 0.13, 0.5, 0.99, 1.0] {
            assert_eq!(smooth(None, x), x);
        }
    }

    #[test]
    fn newest_reading_weighted_by_alpha() {
        assert!((smooth(Some(0.0), 1.0) - SMOOTHING_ALPHA).abs() < 1e-12);
        assert!((smooth(Some(1.0), 0.0) - (1.0 - SMOOTHING_ALPHA)).abs() < 1e-12);
    }

    #[test]
    fn result_is_convex_combination() {
        let pairs = [(0.1, 0.9), (0.9, 0.1), (0.5, 0.5), (0.0, 1.0), (0.72, 0.03)];
        for (prev, cur) in pairs {
            let s = smooth(Some(prev), cur);
            assert!(s >= prev.min(cur) && s <= prev.max(cur));
        }
    }

    #[test]
    fn sustained_shift_converges() {
        let mut value = smooth(None, 0.1);
        for _ in 0..10 {
            value = smooth(Some(value), 0.8);
        }
        assert!((value - 0.8).abs() < 0.01);
    }
}

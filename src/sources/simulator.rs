// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Simulated risk predictor for demo mode and testing

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;

use super::{
    HistoryPoint, HistorySource, Prediction, PredictionSource, ServiceCatalog, SourceError,
};

const DEMO_SERVICES: &[&str] = &["payment-service", "checkout-service", "auth-service"];

/// Maximum history points retained per service
const HISTORY_CAP: usize = 200;

struct SimState {
    rng: StdRng,
    levels: HashMap<String, f64>,
    history: HashMap<String, Vec<HistoryPoint>>,
}

/// Generates a plausible risk probability stream with no backend.
///
/// Each service follows a bounded random walk around a calm baseline, with
/// occasional incident spikes that decay over subsequent polls.
pub struct SimulatedPredictor {
    state: Mutex<SimState>,
    services: Vec<String>,
}

impl SimulatedPredictor {
    /// Simulator with the built-in demo services
    pub fn new() -> Self {
        Self::with_services(DEMO_SERVICES.iter().map(|s| s.to_string()).collect())
    }

    /// Simulator for a custom service list
    pub fn with_services(services: Vec<String>) -> Self {
        Self {
            state: Mutex::new(SimState {
                rng: StdRng::from_entropy(),
                levels: HashMap::new(),
                history: HashMap::new(),
            }),
            services,
        }
    }

    fn next_probability(&self, service: &str) -> f64 {
        let mut state = self.state.lock();

        let level = state.levels.get(service).copied().unwrap_or(0.08);
        let noise = state.rng.sample::<f64, _>(Normal::new(0.0, 0.04).unwrap());

        // Spike occasionally, otherwise drift back toward the baseline.
        let mut next = if state.rng.gen::<f64>() < 0.05 {
            level + state.rng.gen_range(0.35..0.60)
        } else {
            level + (0.08 - level) * 0.25 + noise
        };
        next = next.clamp(0.0, 1.0);

        state.levels.insert(service.to_string(), next);

        let entry = state.history.entry(service.to_string()).or_default();
        entry.push(HistoryPoint {
            probability: next,
            observed_at: Utc::now(),
        });
        if entry.len() > HISTORY_CAP {
            let overflow = entry.len() - HISTORY_CAP;
            entry.drain(0..overflow);
        }

        next
    }
}

impl Default for SimulatedPredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PredictionSource for SimulatedPredictor {
    async fn predict(&self, service: &str, horizon_hours: u32) -> Result<Prediction, SourceError> {
        let probability = self.next_probability(service);

        let top_factors = if probability >= 0.3 {
            vec![
                "error budget burn accelerating".to_string(),
                "p95 latency above baseline".to_string(),
            ]
        } else {
            vec![]
        };

        Ok(Prediction {
            service: service.to_string(),
            probability,
            time_horizon: format!("{horizon_hours} hours"),
            alert_required: probability >= 0.7,
            top_factors,
            observed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl HistorySource for SimulatedPredictor {
    async fn history(&self, service: &str) -> Result<Vec<HistoryPoint>, SourceError> {
        let state = self.state.lock();
        Ok(state.history.get(service).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ServiceCatalog for SimulatedPredictor {
    async fn services(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.services.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probabilities_stay_in_range() {
        let sim = SimulatedPredictor::new();
        for _ in 0..500 {
            let p = sim.predict("payment-service", 6).await.unwrap();
            assert!((0.0..=1.0).contains(&p.probability));
        }
    }

    #[tokio::test]
    async fn history_accumulates_per_service() {
        let sim = SimulatedPredictor::new();
        for _ in 0..5 {
            sim.predict("auth-service", 6).await.unwrap();
        }
        let history = sim.history("auth-service").await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(sim.history("payment-service").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_lists_demo_services() {
        let sim = SimulatedPredictor::new();
        let services = sim.services().await.unwrap();
        assert!(services.contains(&"payment-service".to_string()));
    }
}

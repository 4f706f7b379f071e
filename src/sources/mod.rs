//! Data sources - prediction, history, incident recording, service catalog

mod http;
mod simulator;

pub use http::HttpApi;
pub use simulator::SimulatedPredictor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::session::IncidentEvent;

/// Source failure modes
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or decode failure; the next poll tick is the retry
    #[error("transient source failure: {0}")]
    Transient(String),

    /// A response arrived but violated the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The source cannot serve this request at all
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// One probability observation for a service at a point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Reading {
    /// Predicted SLA breach probability in [0, 1]
    pub probability: f64,
    /// When the observation was produced
    pub observed_at: DateTime<Utc>,
}

/// Full prediction payload from the risk predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Service the prediction is for
    pub service: String,
    /// Predicted SLA breach probability in [0, 1]
    pub probability: f64,
    /// Human-readable horizon label, e.g. "6 hours"
    pub time_horizon: String,
    /// Whether the predictor itself flagged this for alerting
    pub alert_required: bool,
    /// Explanation of the main contributing factors
    pub top_factors: Vec<String>,
    /// When the prediction was produced
    pub observed_at: DateTime<Utc>,
}

impl Prediction {
    /// The part of the prediction the classification engine consumes
    pub fn reading(&self) -> Reading {
        Reading {
            probability: self.probability,
            observed_at: self.observed_at,
        }
    }
}

/// A past prediction, for trend display only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Risk probability at that time
    pub probability: f64,
    /// When the prediction was recorded
    pub observed_at: DateTime<Utc>,
}

/// Produces risk predictions for a service
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Fetch a fresh prediction for `service` over the given horizon
    async fn predict(&self, service: &str, horizon_hours: u32) -> Result<Prediction, SourceError>;
}

/// Serves past readings for trend display; never feeds the classifier
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Ordered sequence of past readings for `service`
    async fn history(&self, service: &str) -> Result<Vec<HistoryPoint>, SourceError>;
}

/// Lists the selectable service names
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// All known service names
    async fn services(&self) -> Result<Vec<String>, SourceError>;
}

/// Durably records incident events.
///
/// Fire-and-forget from the engine's perspective; a failed record is logged
/// and never blocks or corrupts session state.
#[async_trait]
pub trait IncidentSink: Send + Sync {
    /// Record one incident event
    async fn record(&self, event: &IncidentEvent) -> Result<(), SourceError>;
}

/// Incident sink that only writes to the log, for when persistence is disabled
pub struct TracingSink;

#[async_trait]
impl IncidentSink for TracingSink {
    async fn record(&self, event: &IncidentEvent) -> Result<(), SourceError> {
        info!(
            service = %event.service,
            kind = %event.kind,
            probability = event.probability,
            "incident (not persisted)"
        );
        Ok(())
    }
}

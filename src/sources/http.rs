// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! HTTP client for the remote risk predictor

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    HistoryPoint, HistorySource, Prediction, PredictionSource, ServiceCatalog, SourceError,
};
use crate::config::ApiConfig;

/// JSON client for the predictor API.
///
/// Endpoints: `GET /services`, `POST /predict-sla-risk`,
/// `GET /risk-history/{service}`.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// Build a client from the API section of the config
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    service_name: &'a str,
    time_horizon_hours: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    sla_risk_probability: Option<f64>,
    time_horizon: Option<String>,
    #[serde(default)]
    alert_required: bool,
    #[serde(default)]
    top_factors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryPointWire {
    risk_probability: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Transient(format!("predictor returned {status}")))
    }
}

#[async_trait]
impl PredictionSource for HttpApi {
    async fn predict(&self, service: &str, horizon_hours: u32) -> Result<Prediction, SourceError> {
        let request = PredictRequest {
            service_name: service,
            time_horizon_hours: horizon_hours,
        };

        let response = self
            .client
            .post(self.url("/predict-sla-risk"))
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        let body: PredictResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        // A prediction without a probability cannot drive the session.
        let probability = body
            .sla_risk_probability
            .ok_or_else(|| SourceError::Malformed("missing sla_risk_probability".into()))?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(SourceError::Malformed(format!(
                "probability {probability} outside [0, 1]"
            )));
        }

        Ok(Prediction {
            service: service.to_string(),
            probability,
            time_horizon: body.time_horizon.unwrap_or_default(),
            alert_required: body.alert_required,
            top_factors: body.top_factors,
            observed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl HistorySource for HttpApi {
    async fn history(&self, service: &str) -> Result<Vec<HistoryPoint>, SourceError> {
        let response = self
            .client
            .get(self.url(&format!("/risk-history/{service}")))
            .send()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        let body: Vec<HistoryPointWire> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        // Points missing either field are dropped rather than failing the call.
        Ok(body
            .into_iter()
            .filter_map(|p| {
                Some(HistoryPoint {
                    probability: p.risk_probability?,
                    observed_at: p.timestamp?,
                })
            })
            .collect())
    }
}

#[async_trait]
impl ServiceCatalog for HttpApi {
    async fn services(&self) -> Result<Vec<String>, SourceError> {
        let response = self
            .client
            .get(self.url("/services"))
            .send()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_response_tolerates_missing_factors() {
        let body: PredictResponse = serde_json::from_str(
            r#"{"service": "payment-service", "sla_risk_probability": 0.42, "time_horizon": "6 hours"}"#,
        )
        .unwrap();
        assert_eq!(body.sla_risk_probability, Some(0.42));
        assert!(body.top_factors.is_empty());
        assert!(!body.alert_required);
    }

    #[test]
    fn predict_response_without_probability_parses_as_absent() {
        let body: PredictResponse =
            serde_json::from_str(r#"{"service": "payment-service"}"#).unwrap();
        assert!(body.sla_risk_probability.is_none());
    }

    #[test]
    fn history_point_with_missing_fields_is_dropped() {
        let wire: Vec<HistoryPointWire> = serde_json::from_str(
            r#"[
                {"risk_probability": 0.2, "timestamp": "2026-08-01T00:00:00Z"},
                {"risk_probability": 0.5},
                {"timestamp": "2026-08-01T00:30:00Z"}
            ]"#,
        )
        .unwrap();

        let points: Vec<HistoryPoint> = wire
            .into_iter()
            .filter_map(|p| {
                Some(HistoryPoint {
                    probability: p.risk_probability?,
                    observed_at: p.timestamp?,
                })
            })
            .collect();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].probability, 0.2);
    }
}

// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Event bus for inter-component communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::risk::{Mode, RiskState, Trend};
use crate::session::IncidentEvent;

/// Per-poll risk snapshot published after every committed reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskUpdate {
    /// Service being monitored
    pub service: String,
    /// Session operating mode
    pub mode: Mode,
    /// Probability as fetched
    pub raw: f64,
    /// Probability after smoothing
    pub smoothed: f64,
    /// Current severity bucket
    pub state: RiskState,
    /// Direction relative to the previous sample
    pub trend: Trend,
    /// True only on the reading that transitioned back to HEALTHY
    pub recovered: bool,
    /// Whether a CRITICAL acknowledgement is in force
    pub acknowledged: bool,
    /// Whether the predictor itself flagged this for alerting
    pub alert_required: bool,
    /// Main contributing factors, if the predictor supplied any
    pub top_factors: Vec<String>,
    /// Human-readable horizon label
    pub time_horizon: String,
    /// When the underlying prediction was produced
    pub observed_at: DateTime<Utc>,
}

/// Event types in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventType {
    /// A committed risk reading
    RiskUpdate,
    /// A severity boundary crossing
    Incident,
    /// System status change
    SystemStatus,
    /// Non-fatal error report
    Error,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic event id
    pub id: u64,
    /// Kind of event
    pub event_type: EventType,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    /// Event data
    pub payload: EventPayload,
}

/// Payload carried by an [`Event`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Risk snapshot
    Update(RiskUpdate),
    /// Incident lifecycle event
    Incident(IncidentEvent),
    /// Status key/value
    Status {
        /// Status key
        key: String,
        /// Status value
        value: String,
    },
    /// Error report
    Error {
        /// Error description
        message: String,
    },
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    update_tx: broadcast::Sender<RiskUpdate>,
    incident_tx: broadcast::Sender<IncidentEvent>,
    event_tx: broadcast::Sender<Event>,
    event_counter: std::sync::atomic::AtomicU64,
}

impl EventBus {
    /// Bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (update_tx, _) = broadcast::channel(capacity);
        let (incident_tx, _) = broadcast::channel(capacity);
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            update_tx,
            incident_tx,
            event_tx,
            event_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Publish a committed risk reading
    pub fn publish_update(&self, update: RiskUpdate) {
        let _ = self.update_tx.send(update.clone());
        self.publish_event(EventType::RiskUpdate, EventPayload::Update(update));
    }

    /// Publish an incident lifecycle event
    pub fn publish_incident(&self, event: IncidentEvent) {
        let _ = self.incident_tx.send(event.clone());
        self.publish_event(EventType::Incident, EventPayload::Incident(event));
    }

    /// Publish a status change
    pub fn publish_status(&self, key: &str, value: &str) {
        self.publish_event(
            EventType::SystemStatus,
            EventPayload::Status {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
    }

    /// Publish a non-fatal error report
    pub fn publish_error(&self, message: &str) {
        self.publish_event(
            EventType::Error,
            EventPayload::Error {
                message: message.to_string(),
            },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self
            .event_counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to committed risk readings
    pub fn subscribe_updates(&self) -> broadcast::Receiver<RiskUpdate> {
        self.update_tx.subscribe()
    }

    /// Subscribe to incident lifecycle events
    pub fn subscribe_incidents(&self) -> broadcast::Receiver<IncidentEvent> {
        self.incident_tx.subscribe()
    }

    /// Subscribe to the full event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IncidentKind;

    #[tokio::test]
    async fn incidents_reach_subscribers() {
        let bus = EventBus::new(8);
        let mut incidents = bus.subscribe_incidents();
        let mut events = bus.subscribe_events();

        bus.publish_incident(IncidentEvent {
            id: "e-1".into(),
            kind: IncidentKind::CriticalStarted,
            service: "payment-service".into(),
            probability: 0.8,
            occurred_at: Utc::now(),
        });

        let incident = incidents.recv().await.unwrap();
        assert_eq!(incident.kind, IncidentKind::CriticalStarted);

        let wrapped = events.recv().await.unwrap();
        assert_eq!(wrapped.id, 0);
        assert!(matches!(wrapped.payload, EventPayload::Incident(_)));
    }
}

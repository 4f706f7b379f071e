// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Session lifecycle - polling, transition detection, incident emission

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::{EventBus, RiskUpdate};
use crate::risk::{classify, smooth, Mode, RiskState, ThresholdSet, Trend};
use crate::sources::{IncidentSink, PredictionSource, Reading};

/// Incident lifecycle markers emitted on qualifying state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentKind {
    /// State entered WARNING from a different state
    WarningStarted,
    /// State entered CRITICAL from a different state
    CriticalStarted,
    /// State returned to HEALTHY from WARNING or CRITICAL
    Recovered,
}

impl IncidentKind {
    /// Upper-case wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::WarningStarted => "WARNING_STARTED",
            IncidentKind::CriticalStarted => "CRITICAL_STARTED",
            IncidentKind::Recovered => "RECOVERED",
        }
    }
}

impl std::fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WARNING_STARTED" => Ok(IncidentKind::WarningStarted),
            "CRITICAL_STARTED" => Ok(IncidentKind::CriticalStarted),
            "RECOVERED" => Ok(IncidentKind::Recovered),
            other => anyhow::bail!("unknown incident kind '{other}'"),
        }
    }
}

/// A recorded transition crossing a severity boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// Unique event id
    pub id: String,
    /// Which boundary was crossed
    pub kind: IncidentKind,
    /// Service the incident belongs to
    pub service: String,
    /// Smoothed probability at the moment of transition
    pub probability: f64,
    /// When the transition was observed
    pub occurred_at: DateTime<Utc>,
}

/// Everything derived from a single reading
#[derive(Debug, Clone)]
pub struct Observation {
    /// Probability as fetched
    pub raw: f64,
    /// Probability after smoothing
    pub smoothed: f64,
    /// Severity bucket for the smoothed value
    pub state: RiskState,
    /// Direction relative to the previous smoothed value
    pub trend: Trend,
    /// Boundary crossing, if this reading caused one
    pub transition: Option<IncidentKind>,
    /// True only on the reading that transitioned back to HEALTHY
    pub recovered: bool,
    /// Whether a CRITICAL acknowledgement is currently in force
    pub acknowledged: bool,
}

/// Decide which incident event, if any, a state change produces.
///
/// The first reading of a session establishes a baseline without an event.
pub fn detect_transition(previous: Option<RiskState>, next: RiskState) -> Option<IncidentKind> {
    match previous {
        Some(prev) if prev != next => match next {
            RiskState::Warning => Some(IncidentKind::WarningStarted),
            RiskState::Critical => Some(IncidentKind::CriticalStarted),
            // prev != HEALTHY here, so this is always a recovery.
            RiskState::Healthy => Some(IncidentKind::Recovered),
        },
        _ => None,
    }
}

/// Classification state scoped to one (service, mode) pair.
///
/// Destroyed and recreated whenever the service or mode changes; smoothing
/// never leaks across sessions.
#[derive(Debug, Clone)]
pub struct Session {
    service: String,
    mode: Mode,
    thresholds: ThresholdSet,
    last_smoothed: Option<f64>,
    last_state: Option<RiskState>,
    acknowledged: bool,
}

impl Session {
    /// Fresh session with no smoothing history
    pub fn new(service: &str, mode: Mode, thresholds: ThresholdSet) -> Self {
        Self {
            service: service.to_string(),
            mode,
            thresholds,
            last_smoothed: None,
            last_state: None,
            acknowledged: false,
        }
    }

    /// Service this session monitors
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Operating mode of this session
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Last committed smoothed value, if any reading has been processed
    pub fn last_smoothed(&self) -> Option<f64> {
        self.last_smoothed
    }

    /// Last committed risk state, if any reading has been processed
    pub fn last_state(&self) -> Option<RiskState> {
        self.last_state
    }

    /// Mark the current CRITICAL state as acknowledged.
    ///
    /// Has no effect unless the session is currently CRITICAL; the flag
    /// clears automatically on the next non-CRITICAL reading.
    pub fn acknowledge(&mut self) -> bool {
        if self.last_state == Some(RiskState::Critical) {
            self.acknowledged = true;
            true
        } else {
            false
        }
    }

    /// Process one reading: smooth, classify, detect transitions, commit.
    pub fn observe(&mut self, reading: &Reading) -> Observation {
        let smoothed = smooth(self.last_smoothed, reading.probability);
        let assessment = classify(smoothed, self.last_smoothed, &self.thresholds);
        let state = assessment.state;

        let transition = detect_transition(self.last_state, state);
        let recovered = transition == Some(IncidentKind::Recovered);

        if state != RiskState::Critical {
            self.acknowledged = false;
        }

        // Smoothed value and state always commit together.
        self.last_smoothed = Some(smoothed);
        self.last_state = Some(state);

        Observation {
            raw: reading.probability,
            smoothed,
            state,
            trend: assessment.trend,
            transition,
            recovered,
            acknowledged: self.acknowledged,
        }
    }
}

/// Commands accepted by a running session
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    /// Operator acknowledged the current CRITICAL state
    Acknowledge,
}

/// Drives fetch → classify → commit cycles for one session.
///
/// The poll loop is sequential, so at most one fetch is in flight; a slow
/// fetch delays the next tick instead of overlapping it. Every cycle checks
/// the shared epoch counter so a controller that has been superseded by a
/// service or mode switch discards its in-flight result instead of
/// committing stale state.
pub struct SessionController {
    session: Session,
    poll_interval: Duration,
    horizon_hours: u32,
    epoch: u64,
    current_epoch: Arc<AtomicU64>,
    predictor: Arc<dyn PredictionSource>,
    sink: Arc<dyn IncidentSink>,
    event_bus: Arc<EventBus>,
}

impl SessionController {
    /// Controller for a fresh session, bound to the epoch current at creation
    pub fn new(
        session: Session,
        poll_interval: Duration,
        horizon_hours: u32,
        current_epoch: Arc<AtomicU64>,
        predictor: Arc<dyn PredictionSource>,
        sink: Arc<dyn IncidentSink>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let epoch = current_epoch.load(Ordering::Acquire);
        Self {
            session,
            poll_interval,
            horizon_hours,
            epoch,
            current_epoch,
            predictor,
            sink,
            event_bus,
        }
    }

    fn superseded(&self) -> bool {
        self.current_epoch.load(Ordering::Acquire) != self.epoch
    }

    /// Run the poll loop until shutdown or supersession.
    ///
    /// The first poll fires immediately; subsequent polls follow the
    /// configured interval.
    pub async fn run(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<()> {
        info!(
            service = %self.session.service(),
            mode = %self.session.mode(),
            interval_secs = self.poll_interval.as_secs_f64(),
            "session started"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.superseded() {
                        break;
                    }
                    self.poll_once().await;
                }
                Some(cmd) = commands.recv() => {
                    self.handle_command(cmd);
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }

        info!(service = %self.session.service(), "session stopped");
        Ok(())
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Acknowledge => {
                if self.session.acknowledge() {
                    info!(service = %self.session.service(), "critical state acknowledged");
                } else {
                    debug!("acknowledge ignored: session is not CRITICAL");
                }
            }
        }
    }

    async fn poll_once(&mut self) {
        let service = self.session.service().to_string();

        let prediction = match self.predictor.predict(&service, self.horizon_hours).await {
            Ok(p) => p,
            Err(e) => {
                // Prior committed state stays on display; the next tick retries.
                warn!(service = %service, "prediction fetch failed: {e}");
                return;
            }
        };

        // A fetch that outlived its session must not touch newer state.
        if self.superseded() {
            debug!(service = %service, "discarding prediction from superseded session");
            return;
        }

        let observation = self.session.observe(&prediction.reading());
        debug!(
            service = %service,
            raw = observation.raw,
            smoothed = observation.smoothed,
            state = %observation.state,
            "reading processed"
        );

        if let Some(kind) = observation.transition {
            let event = IncidentEvent {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                service: service.clone(),
                probability: observation.smoothed,
                occurred_at: prediction.observed_at,
            };

            info!(service = %service, kind = %kind, probability = observation.smoothed, "incident");
            self.event_bus.publish_incident(event.clone());

            // Fire-and-forget: a sink failure never blocks the session.
            if let Err(e) = self.sink.record(&event).await {
                warn!(service = %service, "incident sink failed: {e}");
            }
        }

        self.event_bus.publish_update(RiskUpdate {
            service,
            mode: self.session.mode(),
            raw: observation.raw,
            smoothed: observation.smoothed,
            state: observation.state,
            trend: observation.trend,
            recovered: observation.recovered,
            acknowledged: observation.acknowledged,
            alert_required: prediction.alert_required,
            top_factors: prediction.top_factors,
            time_horizon: prediction.time_horizon,
            observed_at: prediction.observed_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{classify, PRODUCTION_THRESHOLDS};
    use crate::sources::{Prediction, SourceError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn reading(probability: f64) -> Reading {
        Reading {
            probability,
            observed_at: Utc::now(),
        }
    }

    fn production_session() -> Session {
        Session::new("payment-service", Mode::Production, PRODUCTION_THRESHOLDS)
    }

    #[test]
    fn classification_path_emits_events_in_order() {
        // Raw classification transitions, independent of smoothing.
        let mut previous = None;
        let mut emitted = Vec::new();
        for p in [0.05, 0.40, 0.80, 0.10] {
            let state = classify(p, None, &PRODUCTION_THRESHOLDS).state;
            emitted.push(detect_transition(previous, state));
            previous = Some(state);
        }
        assert_eq!(
            emitted,
            vec![
                None,
                Some(IncidentKind::WarningStarted),
                Some(IncidentKind::CriticalStarted),
                Some(IncidentKind::Recovered),
            ]
        );
    }

    #[test]
    fn first_reading_is_unsmoothed_and_silent() {
        let mut session = production_session();
        let obs = session.observe(&reading(0.42));
        assert_eq!(obs.smoothed, 0.42);
        assert_eq!(obs.transition, None);
        assert_eq!(session.last_state(), Some(RiskState::Warning));
    }

    #[test]
    fn session_walks_through_full_incident_lifecycle() {
        let mut session = production_session();
        let mut transitions = Vec::new();
        // Values chosen so the smoothed stream crosses warning, then critical,
        // then steps down through warning before recovering.
        for p in [0.05, 0.50, 0.95, 0.95, 0.01, 0.01] {
            transitions.push(session.observe(&reading(p)).transition);
        }
        assert_eq!(
            transitions,
            vec![
                None,
                Some(IncidentKind::WarningStarted),
                None,
                Some(IncidentKind::CriticalStarted),
                Some(IncidentKind::WarningStarted),
                Some(IncidentKind::Recovered),
            ]
        );
    }

    #[test]
    fn recovered_flag_is_not_sticky() {
        let mut session = production_session();
        session.observe(&reading(0.90));
        let recovery = session.observe(&reading(0.01));
        // 0.6*0.01 + 0.4*0.9 = 0.366 -> still WARNING, not yet recovered
        assert!(!recovery.recovered);
        let recovery = session.observe(&reading(0.01));
        let recovery2 = session.observe(&reading(0.01));
        assert!(recovery.recovered || recovery2.recovered);
        // The reading after recovery reports false again.
        let after = session.observe(&reading(0.01));
        assert!(!after.recovered);
    }

    #[test]
    fn acknowledge_only_applies_while_critical() {
        let mut session = production_session();
        session.observe(&reading(0.90));
        assert_eq!(session.last_state(), Some(RiskState::Critical));
        assert!(session.acknowledge());

        // Next reading drops to WARNING; the flag resets automatically.
        let obs = session.observe(&reading(0.10));
        assert_eq!(obs.state, RiskState::Warning);
        assert!(!obs.acknowledged);

        // Acknowledging outside CRITICAL is a no-op.
        assert!(!session.acknowledge());
    }

    #[test]
    fn new_session_has_no_inherited_smoothing() {
        let mut first = production_session();
        first.observe(&reading(0.90));

        // Switching service discards the old session entirely.
        let mut second = Session::new("auth-service", Mode::Production, PRODUCTION_THRESHOLDS);
        let obs = second.observe(&reading(0.05));
        assert_eq!(obs.smoothed, 0.05);
        assert_eq!(obs.state, RiskState::Healthy);
    }

    struct ScriptedPredictor {
        values: Mutex<VecDeque<f64>>,
    }

    impl ScriptedPredictor {
        fn new(values: &[f64]) -> Self {
            Self {
                values: Mutex::new(values.iter().copied().collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl PredictionSource for ScriptedPredictor {
        async fn predict(
            &self,
            service: &str,
            horizon_hours: u32,
        ) -> Result<Prediction, SourceError> {
            let probability = self
                .values
                .lock()
                .pop_front()
                .ok_or_else(|| SourceError::Transient("script exhausted".into()))?;
            Ok(Prediction {
                service: service.to_string(),
                probability,
                time_horizon: format!("{horizon_hours} hours"),
                alert_required: false,
                top_factors: vec![],
                observed_at: Utc::now(),
            })
        }
    }

    struct CapturingSink {
        events: Mutex<Vec<IncidentEvent>>,
    }

    #[async_trait::async_trait]
    impl IncidentSink for CapturingSink {
        async fn record(&self, event: &IncidentEvent) -> Result<(), SourceError> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    fn controller(
        script: &[f64],
        sink: Arc<CapturingSink>,
        event_bus: Arc<EventBus>,
        epoch: Arc<AtomicU64>,
    ) -> SessionController {
        SessionController::new(
            production_session(),
            Duration::from_millis(5),
            6,
            epoch,
            Arc::new(ScriptedPredictor::new(script)),
            sink,
            event_bus,
        )
    }

    #[tokio::test]
    async fn controller_records_incident_lifecycle() {
        let sink = Arc::new(CapturingSink {
            events: Mutex::new(vec![]),
        });
        let event_bus = Arc::new(EventBus::new(64));
        let epoch = Arc::new(AtomicU64::new(0));

        let mut updates = event_bus.subscribe_updates();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);

        let script = [0.05, 0.50, 0.95, 0.95, 0.01, 0.01];
        let task = tokio::spawn(
            controller(&script, sink.clone(), event_bus.clone(), epoch).run(shutdown_rx, cmd_rx),
        );

        // One update per successful poll; after the sixth all sink writes are done.
        for _ in 0..script.len() {
            updates.recv().await.unwrap();
        }
        shutdown_tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        let kinds: Vec<IncidentKind> = sink.events.lock().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IncidentKind::WarningStarted,
                IncidentKind::CriticalStarted,
                IncidentKind::WarningStarted,
                IncidentKind::Recovered,
            ]
        );
    }

    #[tokio::test]
    async fn fetch_failure_commits_nothing() {
        let sink = Arc::new(CapturingSink {
            events: Mutex::new(vec![]),
        });
        let event_bus = Arc::new(EventBus::new(64));
        let epoch = Arc::new(AtomicU64::new(0));

        // Empty script: every fetch fails.
        let mut ctrl = controller(&[], sink.clone(), event_bus, epoch);
        ctrl.poll_once().await;

        assert_eq!(ctrl.session.last_state(), None);
        assert_eq!(ctrl.session.last_smoothed(), None);
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn superseded_controller_discards_its_result() {
        let sink = Arc::new(CapturingSink {
            events: Mutex::new(vec![]),
        });
        let event_bus = Arc::new(EventBus::new(64));
        let epoch = Arc::new(AtomicU64::new(0));

        let mut ctrl = controller(&[0.95], sink.clone(), event_bus, epoch.clone());

        // A service switch elsewhere bumps the epoch while the fetch is out.
        epoch.fetch_add(1, Ordering::AcqRel);
        ctrl.poll_once().await;

        assert_eq!(ctrl.session.last_state(), None);
        assert!(sink.events.lock().is_empty());
    }
}

//! Core engine module - session orchestration and event distribution

mod event_bus;

pub use event_bus::{Event, EventBus, EventPayload, EventType, RiskUpdate};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::risk::Mode;
use crate::session::{Session, SessionCommand, SessionController};
use crate::sources::{
    HistoryPoint, HistorySource, IncidentSink, PredictionSource, ServiceCatalog,
};

/// System-wide state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemState {
    /// Whether the engine is running
    pub running: bool,
    /// Currently monitored service, if a session is active
    pub service: Option<String>,
    /// Mode of the active session
    pub mode: Mode,
    /// Readings committed since start
    pub total_readings: u64,
    /// Incident events emitted since start
    pub total_incidents: u64,
    /// Time of the most recent incident
    pub last_incident: Option<DateTime<Utc>>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            running: false,
            service: None,
            mode: Mode::Production,
            total_readings: 0,
            total_incidents: 0,
            last_incident: None,
        }
    }
}

struct ActiveSession {
    service: String,
    mode: Mode,
    shutdown_tx: broadcast::Sender<()>,
    command_tx: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Main SLA-Guard engine.
///
/// Owns the single active session and the shared epoch counter. Switching
/// service or mode bumps the epoch first, so an in-flight fetch from the old
/// session can never commit over the new one.
pub struct Engine {
    config: Arc<Config>,
    event_bus: Arc<EventBus>,
    predictor: Arc<dyn PredictionSource>,
    history: Arc<dyn HistorySource>,
    catalog: Arc<dyn ServiceCatalog>,
    sink: Arc<dyn IncidentSink>,
    state: Arc<RwLock<SystemState>>,
    epoch: Arc<AtomicU64>,
    active: Option<ActiveSession>,
}

impl Engine {
    /// Wire an engine from its collaborators
    pub fn new(
        config: Arc<Config>,
        event_bus: Arc<EventBus>,
        predictor: Arc<dyn PredictionSource>,
        history: Arc<dyn HistorySource>,
        catalog: Arc<dyn ServiceCatalog>,
        sink: Arc<dyn IncidentSink>,
    ) -> Self {
        Self {
            config,
            event_bus,
            predictor,
            history,
            catalog,
            sink,
            state: Arc::new(RwLock::new(SystemState::default())),
            epoch: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    /// Start the engine and open the first session.
    ///
    /// Monitors `service` if given, otherwise the first catalog entry.
    pub async fn start(&mut self, service: Option<&str>) -> Result<()> {
        info!("starting SLA-Guard engine");

        let service = match service {
            Some(s) => s.to_string(),
            None => {
                let services = self
                    .catalog
                    .services()
                    .await
                    .map_err(|e| anyhow!(e))
                    .context("failed to load service catalog")?;
                services
                    .first()
                    .cloned()
                    .ok_or_else(|| anyhow!("service catalog is empty"))?
            }
        };

        self.spawn_bookkeeping();

        {
            let mut state = self.state.write().await;
            state.running = true;
        }

        let mode = self.config.session.default_mode;
        self.select(&service, mode).await?;

        info!("SLA-Guard engine started");
        Ok(())
    }

    /// Switch to a new (service, mode) session.
    ///
    /// Discards the current session and its smoothing history entirely.
    pub async fn select(&mut self, service: &str, mode: Mode) -> Result<()> {
        let thresholds = self.config.thresholds.for_mode(mode);
        thresholds.validate()?;

        // Bump before tearing down: any fetch still in flight is now stale.
        self.epoch.fetch_add(1, Ordering::AcqRel);

        if let Some(active) = self.active.take() {
            info!(from = %active.service, to = %service, "switching session");
            let _ = active.shutdown_tx.send(());
            let _ = active.task.await;
        }

        let session = Session::new(service, mode, thresholds);
        let controller = SessionController::new(
            session,
            self.config.session.poll_interval(),
            self.config.session.horizon_hours,
            self.epoch.clone(),
            self.predictor.clone(),
            self.sink.clone(),
            self.event_bus.clone(),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (command_tx, command_rx) = mpsc::channel(8);

        let task = tokio::spawn(async move {
            if let Err(e) = controller.run(shutdown_rx, command_rx).await {
                error!("session controller failed: {e}");
            }
        });

        self.active = Some(ActiveSession {
            service: service.to_string(),
            mode,
            shutdown_tx,
            command_tx,
            task,
        });

        {
            let mut state = self.state.write().await;
            state.service = Some(service.to_string());
            state.mode = mode;
        }
        self.event_bus.publish_status("session", service);

        Ok(())
    }

    /// Acknowledge the current CRITICAL state, if any session is active
    pub async fn acknowledge(&self) -> Result<()> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| anyhow!("no active session"))?;
        active
            .command_tx
            .send(SessionCommand::Acknowledge)
            .await
            .context("session is no longer accepting commands")?;
        Ok(())
    }

    /// Past readings for trend display
    pub async fn history(&self, service: &str) -> Result<Vec<HistoryPoint>> {
        self.history
            .history(service)
            .await
            .map_err(|e| anyhow!(e))
            .context("failed to fetch risk history")
    }

    /// Selectable service names
    pub async fn services(&self) -> Result<Vec<String>> {
        self.catalog
            .services()
            .await
            .map_err(|e| anyhow!(e))
            .context("failed to load service catalog")
    }

    /// Stop the engine and discard the active session
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping SLA-Guard engine");

        self.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(active) = self.active.take() {
            let _ = active.shutdown_tx.send(());
            let _ = active.task.await;
        }

        {
            let mut state = self.state.write().await;
            state.running = false;
            state.service = None;
        }

        info!("SLA-Guard engine stopped");
        Ok(())
    }

    /// Snapshot of the system state
    pub async fn state(&self) -> SystemState {
        self.state.read().await.clone()
    }

    /// Handle to the event bus
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    fn spawn_bookkeeping(&self) {
        let mut updates = self.event_bus.subscribe_updates();
        let mut incidents = self.event_bus.subscribe_incidents();
        let state = self.state.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = updates.recv() => {
                        match update {
                            Ok(_) => state.write().await.total_readings += 1,
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    incident = incidents.recv() => {
                        match incident {
                            Ok(event) => {
                                let mut s = state.write().await;
                                s.total_incidents += 1;
                                s.last_incident = Some(event.occurred_at);
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{SimulatedPredictor, TracingSink};

    fn test_config() -> Arc<Config> {
        let mut config = Config::default();
        config.session.poll_interval_secs = 1;
        Arc::new(config)
    }

    fn demo_engine() -> Engine {
        let sim = Arc::new(SimulatedPredictor::new());
        Engine::new(
            test_config(),
            Arc::new(EventBus::new(64)),
            sim.clone(),
            sim.clone(),
            sim,
            Arc::new(TracingSink),
        )
    }

    #[tokio::test]
    async fn engine_polls_and_switches_sessions() {
        let mut engine = demo_engine();
        let mut updates = engine.event_bus().subscribe_updates();

        engine.start(None).await.unwrap();

        // First poll fires immediately on session start.
        let update = tokio::time::timeout(std::time::Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.service, "payment-service");

        engine.select("auth-service", Mode::Demo).await.unwrap();
        let update = loop {
            let u = tokio::time::timeout(std::time::Duration::from_secs(5), updates.recv())
                .await
                .unwrap()
                .unwrap();
            // A final update from the old session may still be queued.
            if u.service == "auth-service" {
                break u;
            }
        };
        assert_eq!(update.mode, Mode::Demo);

        let state = engine.state().await;
        assert!(state.running);
        assert_eq!(state.service.as_deref(), Some("auth-service"));

        engine.stop().await.unwrap();
        assert!(!engine.state().await.running);
    }

    #[tokio::test]
    async fn acknowledge_without_session_is_an_error() {
        let engine = demo_engine();
        assert!(engine.acknowledge().await.is_err());
    }
}

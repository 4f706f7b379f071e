// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! SLA-Guard - SLA Risk Monitoring Engine
//!
//! Polls a remote risk predictor on a fixed cadence, smooths and classifies
//! the probability stream per service, and records incident lifecycle events.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use slaguard::config::Config;
use slaguard::core::{Engine, EventBus};
use slaguard::db::IncidentLog;
use slaguard::risk::Mode;
use slaguard::sources::{
    HistorySource, HttpApi, IncidentSink, PredictionSource, ServiceCatalog, SimulatedPredictor,
    TracingSink,
};
use slaguard::VERSION;

/// SLA-Guard - SLA Risk Monitoring Engine
#[derive(Parser, Debug)]
#[command(name = "slaguard")]
#[command(author = "SLA-Guard Project")]
#[command(version = VERSION)]
#[command(about = "Polls a risk predictor and tracks per-service SLA risk state")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with a simulated predictor
    #[arg(long)]
    demo: bool,

    /// Service to monitor (defaults to the first catalog entry)
    #[arg(short, long)]
    service: Option<String>,

    /// Operating mode: production or demo
    #[arg(short, long)]
    mode: Option<String>,

    /// Polling period in seconds
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Predictor API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Data output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🛡 SLA-Guard v{} - SLA Risk Monitoring Engine", VERSION);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
        config.session.default_mode = Mode::Demo;
    }
    if let Some(interval) = args.poll_interval {
        config.session.poll_interval_secs = interval;
    }
    if let Some(api_url) = args.api_url.clone() {
        config.api.base_url = api_url;
    }
    if let Some(data_dir) = args.data_dir.clone() {
        config.database.path = data_dir.join("slaguard.db");
        config.data_dir = data_dir;
    }
    if let Some(mode) = args.mode.as_deref() {
        config.session.default_mode = mode.parse()?;
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args.service))
}

async fn run(config: Config, service: Option<String>) -> Result<()> {
    let config = Arc::new(config);
    let event_bus = Arc::new(EventBus::new(256));

    // Incident sink: durable log unless persistence is disabled
    let sink: Arc<dyn IncidentSink> = if config.database.enabled {
        Arc::new(IncidentLog::open(&config.database)?)
    } else {
        warn!("incident persistence disabled; events will only be logged");
        Arc::new(TracingSink)
    };

    // Data sources: live predictor API, or the simulator in demo mode
    let (predictor, history, catalog): (
        Arc<dyn PredictionSource>,
        Arc<dyn HistorySource>,
        Arc<dyn ServiceCatalog>,
    ) = if config.demo_mode {
        let sim = Arc::new(SimulatedPredictor::new());
        (sim.clone(), sim.clone(), sim)
    } else {
        let api = Arc::new(HttpApi::new(&config.api)?);
        (api.clone(), api.clone(), api)
    };

    let mut engine = Engine::new(
        config.clone(),
        event_bus.clone(),
        predictor,
        history,
        catalog,
        sink,
    );

    spawn_console_reporter(event_bus);

    engine.start(service.as_deref()).await?;

    info!("🚀 SLA-Guard running");
    info!("   Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    engine.stop().await?;

    let state = engine.state().await;
    info!(
        "SLA-Guard shutdown complete ({} readings, {} incidents)",
        state.total_readings, state.total_incidents
    );

    Ok(())
}

/// Log risk updates and incidents to the console
fn spawn_console_reporter(event_bus: Arc<EventBus>) {
    let mut updates = event_bus.subscribe_updates();
    let mut incidents = event_bus.subscribe_incidents();

    use tokio::sync::broadcast::error::RecvError;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    match update {
                        Ok(update) => info!(
                            service = %update.service,
                            state = %update.state,
                            raw = format!("{:.3}", update.raw),
                            smoothed = format!("{:.3}", update.smoothed),
                            trend = ?update.trend,
                            "risk"
                        ),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
                incident = incidents.recv() => {
                    match incident {
                        Ok(incident) => warn!(
                            service = %incident.service,
                            kind = %incident.kind,
                            probability = format!("{:.3}", incident.probability),
                            "incident"
                        ),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    });
}

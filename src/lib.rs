// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! SLA-Guard - SLA Risk Monitoring Engine
//!
//! A headless monitoring service that polls a remote risk predictor and turns
//! a noisy probability stream into a stable, human-meaningful risk state with:
//! - Exponential smoothing of successive readings
//! - Mode-aware threshold classification (HEALTHY / WARNING / CRITICAL)
//! - Incident lifecycle detection (warning started, critical started, recovered)
//! - A durable SQLite incident log
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SLA-Guard Engine                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌──────────┐  ┌────────────────────────┐  │
//! │  │ Sources  │→ │   Risk   │→ │   Session Controller   │  │
//! │  │ (HTTP /  │  │ (smooth, │  │ (poll loop, transition │  │
//! │  │  demo)   │  │ classify)│  │  detection, epochs)    │  │
//! │  └──────────┘  └──────────┘  └────────────────────────┘  │
//! │        ↓             ↓                   ↓               │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                     Event Bus                      │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │        ↓                                 ↓               │
//! │  ┌──────────────┐              ┌──────────────────────┐  │
//! │  │ Incident Log │              │   Console Reporter   │  │
//! │  └──────────────┘              └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod config;
pub mod core;
pub mod db;
pub mod risk;
pub mod session;
pub mod sources;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, EventBus, RiskUpdate};
pub use db::IncidentLog;
pub use risk::{Mode, RiskState, ThresholdSet, Trend};
pub use session::{IncidentEvent, IncidentKind, Session, SessionController};
pub use sources::{HttpApi, Prediction, Reading, SimulatedPredictor};

/// SLA-Guard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SLA-Guard name
pub const NAME: &str = "SLA-Guard";

// Copyright (c) 2026 slaguard
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/slaguard/slaguard-rs

//! Durable incident log backed by SQLite

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::session::{IncidentEvent, IncidentKind};
use crate::sources::{IncidentSink, SourceError};

/// Incident event store
pub struct IncidentLog {
    conn: Arc<Mutex<Connection>>,
    config: DatabaseConfig,
}

impl IncidentLog {
    /// Open or create the incident database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let log = Self {
            conn: Arc::new(Mutex::new(conn)),
            config: config.clone(),
        };
        log.create_tables()?;

        info!("incident log opened at {:?}", config.path);
        Ok(log)
    }

    /// Open an incident log at an explicit path, with default settings
    pub fn open_at(path: &Path) -> Result<Self> {
        let config = DatabaseConfig {
            path: path.to_path_buf(),
            ..DatabaseConfig::default()
        };
        Self::open(&config)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                service TEXT NOT NULL,
                kind TEXT NOT NULL,
                probability REAL NOT NULL,
                occurred_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_incidents_service
                ON incidents(service, occurred_at);
        "#,
        )?;
        Ok(())
    }

    /// Insert one incident event
    pub fn insert(&self, event: &IncidentEvent) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO incidents (id, service, kind, probability, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.service,
                event.kind.as_str(),
                event.probability,
                event.occurred_at.to_rfc3339(),
            ],
        )?;
        debug!(service = %event.service, kind = %event.kind, "incident recorded");
        Ok(())
    }

    /// Most recent incidents, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<IncidentEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, service, kind, probability, occurred_at
             FROM incidents ORDER BY occurred_at DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, service, kind, probability, occurred_at) = row?;
            events.push(IncidentEvent {
                id,
                service,
                kind: kind.parse::<IncidentKind>()?,
                probability,
                occurred_at: DateTime::parse_from_rfc3339(&occurred_at)?.with_timezone(&Utc),
            });
        }
        Ok(events)
    }

    /// Delete incidents older than the retention window, returning the count removed
    pub fn prune(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM incidents WHERE occurred_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        if removed > 0 {
            info!(removed, "pruned old incidents");
        }
        Ok(removed)
    }
}

#[async_trait]
impl IncidentSink for IncidentLog {
    async fn record(&self, event: &IncidentEvent) -> Result<(), SourceError> {
        self.insert(event)
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}

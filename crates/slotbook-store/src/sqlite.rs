//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{Connection, OptionalExtension, params};
use slotbook_api::Reservation;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, Store, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Reservation mirror, one serialized collection per slot
            CREATE TABLE IF NOT EXISTS mirror (
                slot TEXT PRIMARY KEY,
                reservations_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn load_mirror(&self, slot: &str) -> StoreResult<Option<Vec<Reservation>>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT reservations_json FROM mirror WHERE slot = ?",
                [slot],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => {
                let reservations: Vec<Reservation> = serde_json::from_str(&s)?;
                debug!(slot, count = reservations.len(), "Mirror loaded");
                Ok(Some(reservations))
            }
            None => Ok(None),
        }
    }

    fn save_mirror(&self, slot: &str, reservations: &[Reservation]) -> StoreResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(reservations)?;

        conn.execute(
            r#"
            INSERT INTO mirror (slot, reservations_json, saved_at)
            VALUES (?, ?, ?)
            ON CONFLICT(slot)
            DO UPDATE SET reservations_json = excluded.reservations_json,
                          saved_at = excluded.saved_at
            "#,
            params![slot, json, slotbook_util::now().to_rfc3339()],
        )?;

        debug!(slot, count = reservations.len(), "Mirror saved");
        Ok(())
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| slotbook_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

//! Client session state

use chrono::{DateTime, Local};
use serde::Serialize;
use slotbook_util::{Result, SessionId, SlotbookError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// How fresh the local cache is relative to the Reservation Store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Connectivity {
    /// No sync attempted yet; the cache is whatever the mirror held
    Unknown,
    Online { last_sync: DateTime<Local> },
    /// Last sync exhausted its retries; working on a stale cache
    Degraded { since: DateTime<Local>, attempts: u32 },
}

/// One client instance: its identity, the in-flight flag and connectivity
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    started_at: DateTime<Local>,
    in_flight: AtomicBool,
    connectivity: RwLock<Connectivity>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            started_at: slotbook_util::now(),
            in_flight: AtomicBool::new(false),
            connectivity: RwLock::new(Connectivity::Unknown),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Claim the single booking/sync slot of this session.
    /// A second caller is turned away with `Busy`, never queued.
    pub fn begin(&self) -> Result<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SlotbookError::Busy)?;
        Ok(InFlightGuard {
            flag: &self.in_flight,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn connectivity(&self) -> Connectivity {
        *self
            .connectivity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_online(&self) {
        self.set_connectivity(Connectivity::Online {
            last_sync: slotbook_util::now(),
        });
    }

    pub fn mark_degraded(&self, attempts: u32) {
        self.set_connectivity(Connectivity::Degraded {
            since: slotbook_util::now(),
            attempts,
        });
    }

    fn set_connectivity(&self, state: Connectivity) {
        *self
            .connectivity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the in-flight flag when dropped
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

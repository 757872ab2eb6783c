//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use slotbook_api::{BookingOutcome, HourLabel, Resource, Shift};
use slotbook_util::{ReservationId, SessionId};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Client session started
    ClientStarted { session_id: SessionId },

    /// Full snapshot accepted from the Reservation Store
    SyncCompleted { kept: usize, discarded: usize },

    /// Sync gave up; the cache was left as it was
    SyncDegraded { attempts: u32 },

    /// Booking transaction reached a terminal outcome
    BookingSettled {
        resource: Resource,
        date: NaiveDate,
        shift: Shift,
        hours: Vec<HourLabel>,
        outcome: BookingOutcome,
        created: usize,
    },

    /// Reservation cancelled with store confirmation
    ReservationCancelled { reservation_id: ReservationId },

    /// Expiry sweep removed past reservations
    ReservationsExpired { removed: usize },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: slotbook_util::now(),
            event,
        }
    }
}

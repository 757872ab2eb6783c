//! Core events emitted by the coordinator

use chrono::NaiveDate;
use slotbook_api::{BookingOutcome, HourLabel, Resource, Shift};
use slotbook_util::ReservationId;

/// Events emitted by the coordinator for a UI shell to re-render on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Cache replaced by a fresh snapshot
    SyncCompleted { kept: usize, discarded: usize },

    /// Sync gave up; the cache is stale
    SyncDegraded { attempts: u32 },

    /// Booking transaction settled
    BookingSettled {
        resource: Resource,
        date: NaiveDate,
        shift: Shift,
        hours: Vec<HourLabel>,
        outcome: BookingOutcome,
        created: usize,
    },

    ReservationCancelled { reservation_id: ReservationId },

    ReservationsExpired { removed: usize },
}

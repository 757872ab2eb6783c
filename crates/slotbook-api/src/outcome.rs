//! Booking outcomes reported back to the UI shell

use serde::{Deserialize, Serialize};

use crate::{HourLabel, Reservation};

/// How a booking transaction settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingOutcome {
    /// Every requested hour was created
    Success,
    /// Some but not all hours were created; nothing is rolled back
    PartialSuccess,
    /// Nothing created, the store (or the local view) reported the slot taken
    Conflict,
    /// Nothing created, the store could not be reached reliably
    Failure,
}

impl BookingOutcome {
    /// Classify from the created count and whether the blocking failure was a conflict
    pub fn classify(created: usize, requested: usize, conflict: bool) -> Self {
        if requested > 0 && created >= requested {
            BookingOutcome::Success
        } else if created > 0 {
            BookingOutcome::PartialSuccess
        } else if conflict {
            BookingOutcome::Conflict
        } else {
            BookingOutcome::Failure
        }
    }
}

/// Full account of a settled booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingReport {
    pub outcome: BookingOutcome,

    /// The expanded hour range that was requested, in shift order
    pub requested: Vec<HourLabel>,

    /// Reservations the store acknowledged, in hour order
    pub created: Vec<Reservation>,

    /// Transaction attempts made (0 when rejected by the local view)
    pub attempts: u32,

    /// Last message from the store or transport, if any
    pub message: Option<String>,
}

impl BookingReport {
    pub fn created_hours(&self) -> Vec<&HourLabel> {
        self.created.iter().map(|r| &r.hour).collect()
    }

    /// Requested hours that were not created
    pub fn missing_hours(&self) -> Vec<&HourLabel> {
        self.requested
            .iter()
            .filter(|h| !self.created.iter().any(|r| &r.hour == *h))
            .collect()
    }
}

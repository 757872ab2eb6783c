//! Error types for slotbook

use thiserror::Error;

use crate::ReservationId;

/// Core error type for slotbook operations
#[derive(Debug, Error)]
pub enum SlotbookError {
    #[error("Hour '{hour}' is not part of the {shift} shift")]
    InvalidHour { hour: String, shift: String },

    #[error("{duration} hour(s) starting at '{hour}' run past the end of the {shift} shift")]
    InsufficientCapacity {
        hour: String,
        shift: String,
        duration: usize,
    },

    #[error("Communication failure: {0}")]
    Communication(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Another booking or sync is already in flight")]
    Busy,

    #[error("Sync failed after {attempts} attempt(s)")]
    SyncDegraded { attempts: u32 },

    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlotbookError {
    pub fn communication(msg: impl Into<String>) -> Self {
        Self::Communication(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Only communication failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}

pub type Result<T> = std::result::Result<T, SlotbookError>;

//! Shared utilities for slotbook
//!
//! This crate provides:
//! - ID types (ReservationId, SessionId, LockId)
//! - Clock utilities (local date, past-date predicate, mock time)
//! - Error types
//! - Retry with exponential backoff and per-attempt timeout
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod retry;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use retry::*;
pub use time::*;

//! Booking core for slotbook
//!
//! This crate is the heart of slotbook, containing:
//! - Local reservation cache backed by a durable mirror
//! - Availability engine (any occupied hour blocks the whole range)
//! - Sync protocol (full-snapshot replace with retry and backoff)
//! - Booking protocol state machine
//!   (Idle -> CheckingAvailability -> AcquiringLock -> CreatingSlots -> ReleasingLock -> Settled)
//! - Expiry sweeper and usage reports

mod availability;
mod booking;
mod cache;
mod engine;
mod events;
mod report;
mod session;
mod sweeper;
mod sync;

pub use availability::*;
pub use booking::*;
pub use cache::*;
pub use engine::*;
pub use events::*;
pub use report::*;
pub use session::*;
pub use sweeper::*;
pub use sync::*;

#[cfg(test)]
mod test_support;

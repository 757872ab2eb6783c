//! Domain and wire types for slotbook
//!
//! This crate defines the types shared between the booking core, the
//! Reservation Store client and any UI shell:
//! - Slot identity (shift, hour label, resource, slot key)
//! - Reservations and booking requests
//! - Booking outcomes
//! - Reservation Store wire records and response normalization

mod outcome;
mod types;
mod wire;

pub use outcome::*;
pub use types::*;
pub use wire::*;

//! Reservation Store client for slotbook
//!
//! The Reservation Store is the external, authoritative backend. This crate
//! defines the interface the booking core consumes, an HTTP implementation
//! and an in-memory mock for tests.

mod http;
mod mock;
mod traits;

pub use http::*;
pub use mock::*;
pub use traits::*;

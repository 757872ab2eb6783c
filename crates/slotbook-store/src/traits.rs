//! Store trait definitions

use slotbook_api::Reservation;

use crate::{AuditEvent, StoreResult};

/// Name of the mirror slot holding the reservation cache
pub const MIRROR_SLOT: &str = "reservations";

/// Main store trait
pub trait Store: Send + Sync {
    // Reservation mirror

    /// Load the collection saved under `slot`, `None` if nothing was saved yet
    fn load_mirror(&self, slot: &str) -> StoreResult<Option<Vec<Reservation>>>;

    /// Overwrite the collection saved under `slot`
    fn save_mirror(&self, slot: &str, reservations: &[Reservation]) -> StoreResult<()>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

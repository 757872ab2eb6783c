//! Reservation Store trait

use async_trait::async_trait;
use slotbook_api::{CreateAck, LockGrant, LockRequest, LockToken, Reservation, SlotRange, StoreRecord};
use slotbook_util::{ReservationId, SlotbookError};
use thiserror::Error;

/// Errors from Reservation Store calls
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Store rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout(e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

impl From<RemoteError> for SlotbookError {
    fn from(e: RemoteError) -> Self {
        SlotbookError::communication(e.to_string())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The authoritative store every client books against
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Full current reservation set (`getAll`), records as the store sent them
    async fn fetch_all(&self) -> RemoteResult<Vec<StoreRecord>>;

    /// Live availability of a whole hour range (`check`)
    async fn check_availability(&self, range: &SlotRange) -> RemoteResult<bool>;

    /// Create one reservation; the store arbitrates slot collisions
    async fn create(
        &self,
        reservation: &Reservation,
        lock: Option<&LockToken>,
    ) -> RemoteResult<CreateAck>;

    /// Cancel a reservation; `false` when the store refused
    async fn cancel(&self, id: ReservationId) -> RemoteResult<bool>;

    /// Acquire a short-lived lock on a range and check it in one call
    async fn acquire_lock(&self, request: &LockRequest) -> RemoteResult<LockGrant>;

    async fn release_lock(&self, token: &LockToken) -> RemoteResult<()>;
}

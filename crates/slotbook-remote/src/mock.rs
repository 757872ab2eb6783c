//! Mock Reservation Store for testing
//!
//! Behaves like an authoritative store: a slot key can be held by one
//! reservation only, and overlapping ranges cannot be locked twice.

use async_trait::async_trait;
use slotbook_api::{
    CreateAck, HourLabel, LockGrant, LockRequest, LockToken, Reservation, SlotKey, SlotRange,
    StoreRecord,
};
use slotbook_util::{LockId, ReservationId, SessionId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{RemoteError, RemoteResult, ReservationStore};

#[derive(Debug, Clone)]
struct HeldLock {
    session_id: SessionId,
    range: SlotRange,
}

/// In-memory Reservation Store with failure knobs
pub struct MockReservationStore {
    reservations: Arc<Mutex<BTreeMap<ReservationId, Reservation>>>,
    locks: Arc<Mutex<HashMap<LockId, HeldLock>>>,
    create_calls: Arc<Mutex<Vec<HourLabel>>>,
    released: Arc<Mutex<Vec<LockId>>>,
    fetch_calls: Arc<Mutex<u32>>,

    /// Every call fails with a network error
    pub unreachable: Arc<Mutex<bool>>,

    /// Only the availability check fails with a network error
    pub check_unreachable: Arc<Mutex<bool>>,

    /// Number of upcoming fetches that time out
    pub fail_fetches: Arc<Mutex<u32>>,

    /// The next create for each of these hours times out
    pub transient_hours: Arc<Mutex<HashSet<HourLabel>>>,

    /// Creates for these hours are answered with a conflict
    pub conflict_hours: Arc<Mutex<HashSet<HourLabel>>>,

    /// Lock acquisition is answered with a conflict
    pub lock_conflict: Arc<Mutex<bool>>,

    /// Raw records appended to every fetch, as a real store might return them
    pub extra_records: Arc<Mutex<Vec<StoreRecord>>>,

    /// Delay applied before answering any call
    pub latency: Arc<Mutex<Option<Duration>>>,
}

impl MockReservationStore {
    pub fn new() -> Self {
        Self {
            reservations: Arc::new(Mutex::new(BTreeMap::new())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            create_calls: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(Mutex::new(Vec::new())),
            fetch_calls: Arc::new(Mutex::new(0)),
            unreachable: Arc::new(Mutex::new(false)),
            check_unreachable: Arc::new(Mutex::new(false)),
            fail_fetches: Arc::new(Mutex::new(0)),
            transient_hours: Arc::new(Mutex::new(HashSet::new())),
            conflict_hours: Arc::new(Mutex::new(HashSet::new())),
            lock_conflict: Arc::new(Mutex::new(false)),
            extra_records: Arc::new(Mutex::new(Vec::new())),
            latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Seed the store with reservations other clients already made
    pub fn with_reservations(self, reservations: impl IntoIterator<Item = Reservation>) -> Self {
        {
            let mut stored = self.reservations.lock().unwrap();
            for reservation in reservations {
                stored.insert(reservation.id, reservation);
            }
        }
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub fn set_check_unreachable(&self, unreachable: bool) {
        *self.check_unreachable.lock().unwrap() = unreachable;
    }

    pub fn set_fail_fetches(&self, count: u32) {
        *self.fail_fetches.lock().unwrap() = count;
    }

    pub fn set_transient_failure(&self, hour: impl Into<HourLabel>) {
        self.transient_hours.lock().unwrap().insert(hour.into());
    }

    pub fn set_conflict_hour(&self, hour: impl Into<HourLabel>) {
        self.conflict_hours.lock().unwrap().insert(hour.into());
    }

    pub fn set_lock_conflict(&self, conflict: bool) {
        *self.lock_conflict.lock().unwrap() = conflict;
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn push_raw_record(&self, record: StoreRecord) {
        self.extra_records.lock().unwrap().push(record);
    }

    /// Reservations the store currently holds
    pub fn stored(&self) -> Vec<Reservation> {
        self.reservations.lock().unwrap().values().cloned().collect()
    }

    /// Hours of every create call received, in arrival order
    pub fn create_calls(&self) -> Vec<HourLabel> {
        self.create_calls.lock().unwrap().clone()
    }

    /// Locks released so far
    pub fn released_locks(&self) -> Vec<LockId> {
        self.released.lock().unwrap().clone()
    }

    pub fn held_locks(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> u32 {
        *self.fetch_calls.lock().unwrap()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_reachable(&self) -> RemoteResult<()> {
        if *self.unreachable.lock().unwrap() {
            return Err(RemoteError::Network("mock store unreachable".into()));
        }
        Ok(())
    }

    fn is_taken(&self, key: &SlotKey) -> bool {
        self.reservations
            .lock()
            .unwrap()
            .values()
            .any(|r| &r.slot_key() == key)
    }

    fn range_free(&self, range: &SlotRange, session: Option<&SessionId>) -> bool {
        let keys: Vec<SlotKey> = range.slot_keys().collect();
        if keys.iter().any(|k| self.is_taken(k)) {
            return false;
        }

        let locks = self.locks.lock().unwrap();
        !locks.values().any(|held| {
            Some(&held.session_id) != session
                && held.range.slot_keys().any(|k| keys.contains(&k))
        })
    }
}

impl Default for MockReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationStore for MockReservationStore {
    async fn fetch_all(&self) -> RemoteResult<Vec<StoreRecord>> {
        self.simulate_latency().await;
        *self.fetch_calls.lock().unwrap() += 1;
        self.check_reachable()?;

        {
            let mut remaining = self.fail_fetches.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Timeout("mock fetch timed out".into()));
            }
        }

        let mut records: Vec<StoreRecord> = self
            .reservations
            .lock()
            .unwrap()
            .values()
            .map(StoreRecord::from)
            .collect();
        records.extend(self.extra_records.lock().unwrap().iter().cloned());
        Ok(records)
    }

    async fn check_availability(&self, range: &SlotRange) -> RemoteResult<bool> {
        self.simulate_latency().await;
        self.check_reachable()?;
        if *self.check_unreachable.lock().unwrap() {
            return Err(RemoteError::Network("mock check unreachable".into()));
        }
        Ok(self.range_free(range, None))
    }

    async fn create(
        &self,
        reservation: &Reservation,
        _lock: Option<&LockToken>,
    ) -> RemoteResult<CreateAck> {
        self.simulate_latency().await;
        self.create_calls.lock().unwrap().push(reservation.hour.clone());
        self.check_reachable()?;

        if self.transient_hours.lock().unwrap().remove(&reservation.hour) {
            return Err(RemoteError::Timeout("mock create timed out".into()));
        }

        if self.conflict_hours.lock().unwrap().contains(&reservation.hour)
            || self.is_taken(&reservation.slot_key())
        {
            return Ok(CreateAck::Conflict("slot already reserved".into()));
        }

        self.reservations
            .lock()
            .unwrap()
            .insert(reservation.id, reservation.clone());
        Ok(CreateAck::Created)
    }

    async fn cancel(&self, id: ReservationId) -> RemoteResult<bool> {
        self.simulate_latency().await;
        self.check_reachable()?;
        Ok(self.reservations.lock().unwrap().remove(&id).is_some())
    }

    async fn acquire_lock(&self, request: &LockRequest) -> RemoteResult<LockGrant> {
        self.simulate_latency().await;
        self.check_reachable()?;

        if *self.lock_conflict.lock().unwrap() {
            return Ok(LockGrant {
                acquired: false,
                available: false,
                conflict: true,
                message: Some("range locked by another session".into()),
            });
        }

        if !self.range_free(&request.range, Some(&request.session_id)) {
            return Ok(LockGrant {
                acquired: false,
                available: false,
                conflict: false,
                message: Some("range not available".into()),
            });
        }

        self.locks.lock().unwrap().insert(
            request.lock_id.clone(),
            HeldLock {
                session_id: request.session_id.clone(),
                range: request.range.clone(),
            },
        );

        Ok(LockGrant {
            acquired: true,
            available: true,
            conflict: false,
            message: None,
        })
    }

    async fn release_lock(&self, token: &LockToken) -> RemoteResult<()> {
        self.released.lock().unwrap().push(token.lock_id.clone());
        self.check_reachable()?;
        self.locks.lock().unwrap().remove(&token.lock_id);
        Ok(())
    }
}

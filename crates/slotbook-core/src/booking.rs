//! Booking protocol state machine
//!
//! One transaction per request:
//! Idle -> CheckingAvailability -> AcquiringLock -> CreatingSlots -> ReleasingLock -> Settled
//!
//! Communication failures retry the whole sequence for the hours not yet
//! created. A conflict reported by the store is terminal. Slots the store
//! acknowledged are cached immediately and never rolled back.

use chrono::{DateTime, Local, NaiveDate};
use slotbook_api::{
    BookingOutcome, BookingReport, BookingRequest, CreateAck, HourLabel, LockRequest, LockToken,
    Reservation, SlotRange,
};
use slotbook_config::{BookingSettings, Catalog, CreationMode};
use slotbook_remote::{RemoteResult, ReservationStore};
use slotbook_util::{
    AttemptError, LockId, ReservationIdBatch, Result, RetryPolicy, SessionId, SlotbookError,
    retry_with_backoff,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{ReservationCache, range_occupied};

/// Where a booking transaction currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Idle,
    CheckingAvailability,
    AcquiringLock,
    CreatingSlots,
    ReleasingLock,
    Settled(BookingOutcome),
}

/// Validate a request and expand it to its hour range
pub fn prepare_request(
    catalog: &Catalog,
    request: &BookingRequest,
    today: NaiveDate,
) -> Result<Vec<HourLabel>> {
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(SlotbookError::validation("first and last name are required"));
    }
    if request.date < today {
        return Err(SlotbookError::validation(format!(
            "{} has already passed",
            request.date
        )));
    }
    if !catalog.has_resource(request.shift, &request.resource) {
        return Err(SlotbookError::validation(format!(
            "'{}' cannot be booked in the {} shift",
            request.resource, request.shift
        )));
    }

    catalog.expand_range(request.shift, &request.start_hour, request.duration)
}

/// Report for a request the local view already shows as occupied
pub fn local_conflict_report(hours: Vec<HourLabel>) -> BookingReport {
    BookingReport {
        outcome: BookingOutcome::Conflict,
        requested: hours,
        created: Vec::new(),
        attempts: 0,
        message: Some("the local view shows part of the range as reserved".into()),
    }
}

/// Collaborators a transaction talks to
pub struct BookingContext<'a> {
    pub remote: Arc<dyn ReservationStore>,
    pub cache: &'a ReservationCache,
    pub settings: &'a BookingSettings,
    pub session_id: &'a SessionId,
    /// Bound for every single store call
    pub request_timeout: Duration,
    pub today: NaiveDate,
}

struct Ledger {
    state: BookingState,
    history: Vec<BookingState>,
    created: Vec<Reservation>,
    attempts: u32,
}

/// A single booking request being driven to a settled outcome
pub struct BookingTransaction<'a> {
    ctx: BookingContext<'a>,
    request: &'a BookingRequest,
    hours: Vec<HourLabel>,
    created_at: DateTime<Local>,
    ids: ReservationIdBatch,
    ledger: Mutex<Ledger>,
}

impl<'a> BookingTransaction<'a> {
    /// `hours` is the expanded range from [`prepare_request`]
    pub fn new(ctx: BookingContext<'a>, request: &'a BookingRequest, hours: Vec<HourLabel>) -> Self {
        Self {
            ctx,
            request,
            hours,
            created_at: slotbook_util::now(),
            ids: ReservationIdBatch::new(),
            ledger: Mutex::new(Ledger {
                state: BookingState::Idle,
                history: vec![BookingState::Idle],
                created: Vec::new(),
                attempts: 0,
            }),
        }
    }

    pub fn state(&self) -> BookingState {
        self.ledger().state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> Vec<BookingState> {
        self.ledger().history.clone()
    }

    /// Drive the transaction to a settled outcome
    pub async fn run(&self) -> BookingReport {
        // Attempts are never cut short: a cancelled attempt would skip its lock release
        let policy = RetryPolicy {
            attempt_timeout: None,
            ..self.ctx.settings.retry.clone()
        };

        let result = retry_with_backoff(&policy, "booking", move |attempt| self.attempt(attempt)).await;

        let (conflict, message) = match &result {
            Ok(()) => (false, None),
            Err(failure) => (
                matches!(failure.last, AttemptError::Failed(SlotbookError::Conflict(_))),
                Some(failure.last.to_string()),
            ),
        };

        let (created, attempts) = {
            let ledger = self.ledger();
            let mut created = ledger.created.clone();
            created.sort_by_key(|r| self.hour_index(&r.hour));
            (created, ledger.attempts)
        };

        let outcome = BookingOutcome::classify(created.len(), self.hours.len(), conflict);
        self.transition(BookingState::Settled(outcome));

        info!(
            resource = %self.request.resource,
            date = %self.request.date,
            shift = %self.request.shift,
            outcome = ?outcome,
            created = created.len(),
            requested = self.hours.len(),
            attempts,
            "Booking settled"
        );

        BookingReport {
            outcome,
            requested: self.hours.clone(),
            created,
            attempts,
            message,
        }
    }

    async fn attempt(&self, attempt: u32) -> Result<()> {
        self.ledger().attempts = attempt;

        let remaining = self.remaining_hours();
        if remaining.is_empty() {
            return Ok(());
        }
        debug!(attempt, remaining = remaining.len(), "Booking attempt");

        let range = SlotRange {
            date: self.request.date,
            shift: self.request.shift,
            resource: self.request.resource.clone(),
            hours: remaining,
        };

        self.transition(BookingState::CheckingAvailability);
        if self.ctx.settings.uses_remote_precheck() {
            self.precheck(&range).await?;
        }

        let lock = match self.ctx.settings.lock_ttl {
            Some(ttl) => {
                self.transition(BookingState::AcquiringLock);
                Some(self.acquire_lock(&range, ttl).await?)
            }
            None => None,
        };

        self.transition(BookingState::CreatingSlots);
        let created = match self.ctx.settings.creation {
            CreationMode::Sequential => self.create_sequential(&range.hours, lock.as_ref()).await,
            CreationMode::Concurrent => self.create_concurrent(&range.hours, lock.as_ref()).await,
        };

        if let Some(token) = &lock {
            self.release_lock(token).await;
        }

        created
    }

    /// Best-effort live check. An unreachable store falls back to the
    /// local view; slot creation stays the final authority.
    async fn precheck(&self, range: &SlotRange) -> Result<()> {
        match self.call(self.ctx.remote.check_availability(range)).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SlotbookError::conflict("the store reports the range as reserved")),
            Err(e) => {
                warn!(error = %e, "Availability pre-check unavailable, using the local view");
                let occupied = self.ctx.cache.occupied_slot_set(self.ctx.today);
                if range_occupied(&occupied, range.date, range.shift, &range.hours, &range.resource) {
                    Err(SlotbookError::conflict("the local view shows the range as reserved"))
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn acquire_lock(&self, range: &SlotRange, ttl: Duration) -> Result<LockToken> {
        let request = LockRequest {
            range: range.clone(),
            lock_id: LockId::new(),
            session_id: self.ctx.session_id.clone(),
            ttl,
        };
        let token = LockToken {
            lock_id: request.lock_id.clone(),
            session_id: request.session_id.clone(),
        };

        let grant = match self.call(self.ctx.remote.acquire_lock(&request)).await {
            Ok(grant) => grant,
            Err(e) => {
                // The store may have granted it before the answer was lost
                self.release_lock(&token).await;
                return Err(e);
            }
        };

        if grant.is_usable() {
            debug!(lock_id = %token.lock_id, hours = %range.hours_param(), "Lock acquired");
            return Ok(token);
        }

        if grant.acquired {
            self.release_lock(&token).await;
        }

        let message = grant
            .message
            .unwrap_or_else(|| "the range is locked or reserved".into());
        if grant.conflict || !grant.available {
            warn!(hours = %range.hours_param(), message = %message, "Lock refused");
            Err(SlotbookError::conflict(message))
        } else {
            Err(SlotbookError::communication(format!("lock not granted: {}", message)))
        }
    }

    async fn release_lock(&self, token: &LockToken) {
        self.transition(BookingState::ReleasingLock);
        match self.call(self.ctx.remote.release_lock(token)).await {
            Ok(()) => debug!(lock_id = %token.lock_id, "Lock released"),
            Err(e) => warn!(lock_id = %token.lock_id, error = %e, "Lock release failed, TTL will reclaim it"),
        }
    }

    /// Ascending hour order, stop at the first slot that fails
    async fn create_sequential(&self, hours: &[HourLabel], lock: Option<&LockToken>) -> Result<()> {
        for hour in hours {
            let reservation = self.reservation_for(hour);
            let ack = self.call(self.ctx.remote.create(&reservation, lock)).await;
            self.record_ack(reservation, ack)?;
        }
        Ok(())
    }

    /// Every hour at once, every result counted
    async fn create_concurrent(&self, hours: &[HourLabel], lock: Option<&LockToken>) -> Result<()> {
        let mut tasks = JoinSet::new();
        for hour in hours {
            let reservation = self.reservation_for(hour);
            let remote = Arc::clone(&self.ctx.remote);
            let lock = lock.cloned();
            let limit = self.ctx.request_timeout;

            tasks.spawn(async move {
                let ack = bounded(limit, remote.create(&reservation, lock.as_ref())).await;
                (reservation, ack)
            });
        }

        let mut failure: Option<SlotbookError> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok((reservation, ack)) => self.record_ack(reservation, ack),
                Err(e) => Err(SlotbookError::internal(format!("create task failed: {}", e))),
            };

            if let Err(e) = result {
                // A conflict cannot be fixed by retrying, keep it over transient errors
                failure = match failure {
                    Some(conflict @ SlotbookError::Conflict(_)) => Some(conflict),
                    _ => Some(e),
                };
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn record_ack(&self, reservation: Reservation, ack: Result<CreateAck>) -> Result<()> {
        match ack? {
            CreateAck::Created => {
                debug!(reservation_id = %reservation.id, hour = %reservation.hour, "Slot created");
                self.ctx.cache.add(reservation.clone());
                self.ledger().created.push(reservation);
                Ok(())
            }
            CreateAck::Conflict(message) => {
                warn!(hour = %reservation.hour, message = %message, "Store reported a conflict");
                Err(SlotbookError::Conflict(message))
            }
            CreateAck::Rejected(message) => {
                warn!(hour = %reservation.hour, message = %message, "Store rejected the slot");
                Err(SlotbookError::communication(format!(
                    "store rejected hour {}: {}",
                    reservation.hour, message
                )))
            }
        }
    }

    async fn call<T>(&self, fut: impl Future<Output = RemoteResult<T>>) -> Result<T> {
        bounded(self.ctx.request_timeout, fut).await
    }

    fn reservation_for(&self, hour: &HourLabel) -> Reservation {
        self.request
            .reservation_for(hour.clone(), self.ids.id(self.hour_index(hour)), self.created_at)
    }

    fn hour_index(&self, hour: &HourLabel) -> usize {
        self.hours
            .iter()
            .position(|h| h == hour)
            .unwrap_or(self.hours.len())
    }

    fn remaining_hours(&self) -> Vec<HourLabel> {
        let ledger = self.ledger();
        self.hours
            .iter()
            .filter(|h| !ledger.created.iter().any(|r| &r.hour == *h))
            .cloned()
            .collect()
    }

    fn transition(&self, next: BookingState) {
        let mut ledger = self.ledger();
        debug!(from = ?ledger.state, to = ?next, "Booking state change");
        ledger.state = next;
        ledger.history.push(next);
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn bounded<T>(limit: Duration, fut: impl Future<Output = RemoteResult<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(SlotbookError::from),
        Err(_) => Err(SlotbookError::communication(format!(
            "store call timed out after {:?}",
            limit
        ))),
    }
}

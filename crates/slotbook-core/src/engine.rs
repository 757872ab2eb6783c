//! Booking coordinator
//!
//! Composes the cache, availability engine, sync and booking protocols
//! behind the calls a UI shell makes. Owns the session state that would
//! otherwise be ambient: session id, in-flight flag and connectivity.

use chrono::NaiveDate;
use slotbook_api::{BookingReport, BookingRequest, HourLabel, Reservation, Shift};
use slotbook_config::{Catalog, Settings};
use slotbook_remote::ReservationStore;
use slotbook_store::{AuditEvent, AuditEventType, Store};
use slotbook_util::{ReservationId, Result, SlotbookError};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    AvailabilityReport, BookingContext, BookingTransaction, ClientSession, Connectivity, CoreEvent,
    ReservationCache, SyncReport, UsageReport, build_report, local_conflict_report,
    prepare_request, range_occupied,
};

const EVENT_CAPACITY: usize = 64;

/// The booking coordinator for one client instance
pub struct Coordinator {
    settings: Settings,
    remote: Arc<dyn ReservationStore>,
    store: Arc<dyn Store>,
    cache: ReservationCache,
    session: ClientSession,
    events: broadcast::Sender<CoreEvent>,
}

impl Coordinator {
    /// Load the cache from the durable mirror and sweep what expired while
    /// the client was not running
    pub fn new(settings: Settings, remote: Arc<dyn ReservationStore>, store: Arc<dyn Store>) -> Self {
        let cache = ReservationCache::load(Arc::clone(&store));
        let session = ClientSession::new();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            session_id = %session.id(),
            cached = cache.len(),
            "Coordinator initialized"
        );

        let coordinator = Self {
            settings,
            remote,
            store,
            cache,
            session,
            events,
        };

        coordinator.audit(AuditEventType::ClientStarted {
            session_id: coordinator.session.id().clone(),
        });
        coordinator.sweep();

        coordinator
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.settings.catalog
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn cache(&self) -> &ReservationCache {
        &self.cache
    }

    /// Subscribe to core events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> Connectivity {
        self.session.connectivity()
    }

    /// Whether the cache is known to be stale
    pub fn is_degraded(&self) -> bool {
        matches!(self.connectivity(), Connectivity::Degraded { .. })
    }

    // Queries

    pub fn active_reservations(&self) -> Vec<Reservation> {
        self.cache.active_reservations(self.today())
    }

    /// Occupancy of every resource of `shift` for the proposed range, from the local view
    pub fn check_availability(
        &self,
        date: NaiveDate,
        shift: Shift,
        start: &HourLabel,
        duration: usize,
    ) -> Result<AvailabilityReport> {
        let today = self.today();
        crate::check_availability(
            &self.settings.catalog,
            &self.cache.occupied_slot_set(today),
            date,
            shift,
            start,
            duration,
        )
    }

    pub fn report(&self) -> UsageReport {
        let today = self.today();
        build_report(
            &self.settings.catalog,
            &self.cache.active_reservations(today),
            today,
        )
    }

    // Actions

    /// Refresh the cache from the Reservation Store. `false` means the
    /// cache was left as it was.
    pub async fn synchronize(&self) -> bool {
        match self.try_synchronize().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Synchronize did not complete");
                false
            }
        }
    }

    pub async fn try_synchronize(&self) -> Result<SyncReport> {
        let _guard = self.session.begin()?;

        let result = crate::synchronize(
            self.remote.as_ref(),
            &self.cache,
            &self.settings.sync.retry,
            self.today(),
        )
        .await;

        match &result {
            Ok(report) => {
                self.session.mark_online();
                self.audit(AuditEventType::SyncCompleted {
                    kept: report.kept,
                    discarded: report.discarded,
                });
                self.emit(CoreEvent::SyncCompleted {
                    kept: report.kept,
                    discarded: report.discarded,
                });
            }
            Err(SlotbookError::SyncDegraded { attempts }) => {
                self.session.mark_degraded(*attempts);
                self.audit(AuditEventType::SyncDegraded {
                    attempts: *attempts,
                });
                self.emit(CoreEvent::SyncDegraded {
                    attempts: *attempts,
                });
            }
            Err(_) => {}
        }

        result
    }

    /// Run one booking transaction to a settled outcome.
    ///
    /// Validation errors and `Busy` come back as `Err`; every booking that
    /// reaches the protocol settles into a report.
    pub async fn book(&self, request: &BookingRequest) -> Result<BookingReport> {
        let _guard = self.session.begin()?;
        let today = self.today();
        let hours = prepare_request(&self.settings.catalog, request, today)?;

        if self.settings.booking.local_fast_path {
            let occupied = self.cache.occupied_slot_set(today);
            if range_occupied(&occupied, request.date, request.shift, &hours, &request.resource) {
                info!(
                    resource = %request.resource,
                    date = %request.date,
                    shift = %request.shift,
                    "Booking rejected by the local view"
                );
                let report = local_conflict_report(hours);
                self.settle(request, &report);
                return Ok(report);
            }
        }

        let transaction = BookingTransaction::new(
            BookingContext {
                remote: Arc::clone(&self.remote),
                cache: &self.cache,
                settings: &self.settings.booking,
                session_id: self.session.id(),
                request_timeout: self.settings.store.request_timeout,
                today,
            },
            request,
            hours,
        );

        let report = transaction.run().await;
        self.settle(request, &report);
        Ok(report)
    }

    /// Cancel a cached reservation. The cache only changes once the store
    /// confirms; `Ok(false)` means the store declined.
    pub async fn cancel(&self, id: ReservationId) -> Result<bool> {
        let _guard = self.session.begin()?;

        if self.cache.get(id).is_none() {
            return Err(SlotbookError::NotFound(id));
        }

        let limit = self.settings.store.request_timeout;
        let confirmed = match tokio::time::timeout(limit, self.remote.cancel(id)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SlotbookError::communication(format!(
                    "cancel timed out after {:?}",
                    limit
                )));
            }
        };

        if !confirmed {
            warn!(reservation_id = %id, "Store declined the cancellation");
            return Ok(false);
        }

        self.cache.remove(id);
        info!(reservation_id = %id, "Reservation cancelled");
        self.audit(AuditEventType::ReservationCancelled { reservation_id: id });
        self.emit(CoreEvent::ReservationCancelled { reservation_id: id });
        Ok(true)
    }

    /// Drop reservations dated before today
    pub fn sweep(&self) -> usize {
        let removed = crate::sweep(&self.cache, self.today());
        if removed > 0 {
            self.audit(AuditEventType::ReservationsExpired { removed });
            self.emit(CoreEvent::ReservationsExpired { removed });
        }
        removed
    }

    fn settle(&self, request: &BookingRequest, report: &BookingReport) {
        self.audit(AuditEventType::BookingSettled {
            resource: request.resource.clone(),
            date: request.date,
            shift: request.shift,
            hours: report.requested.clone(),
            outcome: report.outcome,
            created: report.created.len(),
        });
        self.emit(CoreEvent::BookingSettled {
            resource: request.resource.clone(),
            date: request.date,
            shift: request.shift,
            hours: report.requested.clone(),
            outcome: report.outcome,
            created: report.created.len(),
        });
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn today(&self) -> NaiveDate {
        slotbook_util::today()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{request, reservation};
    use slotbook_api::BookingOutcome;
    use slotbook_remote::MockReservationStore;
    use slotbook_store::{MIRROR_SLOT, SqliteStore};
    use slotbook_util::RetryPolicy;
    use std::time::Duration;

    fn settings() -> Settings {
        let mut settings = Settings::with_endpoint("https://store.example/exec");
        settings.sync.retry =
            RetryPolicy::new(3, Duration::from_millis(1)).with_attempt_timeout(Duration::from_secs(1));
        settings.booking.retry = RetryPolicy::new(3, Duration::from_millis(1));
        settings.store.request_timeout = Duration::from_secs(1);
        settings
    }

    fn offset(days: i64) -> NaiveDate {
        slotbook_util::today() + chrono::Duration::days(days)
    }

    fn coordinator(remote: &Arc<MockReservationStore>) -> (Coordinator, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let coordinator = Coordinator::new(settings(), remote.clone(), store.clone());
        (coordinator, store)
    }

    fn projector(start: &str, duration: usize) -> BookingRequest {
        request(offset(1), Shift::Morning, start, duration, "Cañón")
    }

    #[test]
    fn start_sweeps_the_loaded_mirror() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .save_mirror(
                MIRROR_SLOT,
                &[
                    reservation(offset(-2), "1era", "Cañón"),
                    reservation(offset(2), "1era", "Cañón"),
                ],
            )
            .unwrap();

        let coordinator = Coordinator::new(
            settings(),
            Arc::new(MockReservationStore::new()),
            store.clone(),
        );
        assert_eq!(coordinator.cache().len(), 1);
        assert_eq!(coordinator.connectivity(), Connectivity::Unknown);

        let audits = store.get_recent_audits(10).unwrap();
        assert!(audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::ReservationsExpired { removed: 1 })));
        assert!(audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::ClientStarted { .. })));
    }

    #[tokio::test]
    async fn successful_booking_adds_every_hour() {
        let remote = Arc::new(MockReservationStore::new());
        let (coordinator, _) = coordinator(&remote);
        let mut events = coordinator.subscribe();

        let report = coordinator.book(&projector("1era", 2)).await.unwrap();
        assert_eq!(report.outcome, BookingOutcome::Success);

        let active = coordinator.active_reservations();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|r| r.resource.as_str() == "Cañón" && r.date == offset(1)));
        assert_eq!(remote.stored().len(), 2);

        match events.recv().await.unwrap() {
            CoreEvent::BookingSettled { outcome, created, .. } => {
                assert_eq!(outcome, BookingOutcome::Success);
                assert_eq!(created, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!coordinator.session().is_busy());
    }

    #[tokio::test]
    async fn partial_failure_keeps_created_slot_and_releases_lock() {
        let remote = Arc::new(MockReservationStore::new());
        remote.set_conflict_hour("2da");
        let (coordinator, _) = coordinator(&remote);

        let report = coordinator.book(&projector("1era", 2)).await.unwrap();
        assert_eq!(report.outcome, BookingOutcome::PartialSuccess);
        assert_eq!(coordinator.active_reservations().len(), 1);
        assert_eq!(remote.released_locks().len(), 1);
        assert_eq!(remote.held_locks(), 0);
    }

    #[tokio::test]
    async fn local_view_rejects_before_any_store_call() {
        let remote = Arc::new(MockReservationStore::new());
        let (coordinator, _) = coordinator(&remote);
        coordinator
            .cache()
            .add(reservation(offset(1), "1era", "Cañón"));

        let availability = coordinator
            .check_availability(offset(1), Shift::Morning, &"1era".into(), 2)
            .unwrap();
        assert_eq!(availability.is_occupied(&"Cañón".into()), Some(true));

        let report = coordinator.book(&projector("1era", 1)).await.unwrap();
        assert_eq!(report.outcome, BookingOutcome::Conflict);
        assert_eq!(report.attempts, 0);
        assert!(remote.create_calls().is_empty());
        assert_eq!(remote.held_locks(), 0);
        assert!(remote.released_locks().is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_fail_without_store_calls() {
        let remote = Arc::new(MockReservationStore::new());
        let (coordinator, _) = coordinator(&remote);

        let result = coordinator.book(&projector("8va", 2)).await;
        assert!(matches!(result, Err(SlotbookError::InsufficientCapacity { .. })));

        let result = coordinator.book(&projector("9na", 1)).await;
        assert!(matches!(result, Err(SlotbookError::InvalidHour { .. })));

        assert!(remote.create_calls().is_empty());
        assert!(!coordinator.session().is_busy());
    }

    #[tokio::test]
    async fn sync_exhaustion_keeps_cache_and_marks_degraded() {
        let remote = Arc::new(MockReservationStore::new());
        remote.set_unreachable(true);
        let (coordinator, store) = coordinator(&remote);
        let existing = reservation(offset(1), "3era", "Cañón");
        coordinator.cache().add(existing.clone());

        assert!(!coordinator.synchronize().await);
        assert_eq!(remote.fetch_count(), 3);
        assert_eq!(coordinator.cache().all(), vec![existing]);
        assert!(coordinator.is_degraded());

        let audits = store.get_recent_audits(10).unwrap();
        assert!(audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::SyncDegraded { attempts: 3 })));

        remote.set_unreachable(false);
        assert!(coordinator.synchronize().await);
        assert!(matches!(coordinator.connectivity(), Connectivity::Online { .. }));
        assert!(coordinator.cache().is_empty());
    }

    #[tokio::test]
    async fn sync_discards_past_reservations() {
        let remote = Arc::new(
            MockReservationStore::new().with_reservations([
                reservation(offset(-1), "1era", "Cañón"),
                reservation(offset(0), "1era", "Cañón"),
                reservation(offset(3), "2da", "Cañón"),
            ]),
        );
        let (coordinator, _) = coordinator(&remote);

        let report = coordinator.try_synchronize().await.unwrap();
        assert_eq!(report.kept, 2);
        assert_eq!(report.discarded, 1);
        assert_eq!(coordinator.active_reservations().len(), 2);
        assert_eq!(coordinator.report().total_active, 2);
        assert_eq!(coordinator.report().today, 1);
    }

    #[tokio::test]
    async fn second_operation_is_busy_while_one_is_in_flight() {
        let remote = Arc::new(MockReservationStore::new());
        remote.set_latency(Some(Duration::from_millis(200)));
        let (coordinator, _) = coordinator(&remote);
        let coordinator = Arc::new(coordinator);

        let booking = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.book(&projector("1era", 1)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(coordinator.session().is_busy());
        assert!(matches!(
            coordinator.try_synchronize().await,
            Err(SlotbookError::Busy)
        ));
        // Busy is not a connectivity problem
        assert!(!coordinator.synchronize().await);
        assert!(!coordinator.is_degraded());

        let report = booking.await.unwrap().unwrap();
        assert_eq!(report.outcome, BookingOutcome::Success);
        assert!(!coordinator.session().is_busy());
    }

    #[tokio::test]
    async fn cancel_requires_store_confirmation() {
        let remote = Arc::new(MockReservationStore::new());
        let (coordinator, _) = coordinator(&remote);

        let missing = coordinator.cancel(ReservationId::new(7)).await;
        assert!(matches!(missing, Err(SlotbookError::NotFound(_))));

        let report = coordinator.book(&projector("1era", 2)).await.unwrap();
        let first = report.created[0].id;
        let second = report.created[1].id;

        assert!(coordinator.cancel(first).await.unwrap());
        assert_eq!(coordinator.active_reservations().len(), 1);
        assert_eq!(remote.stored().len(), 1);

        remote.set_unreachable(true);
        let result = coordinator.cancel(second).await;
        assert!(matches!(result, Err(SlotbookError::Communication(_))));
        assert!(coordinator.cache().get(second).is_some());
    }

    #[tokio::test]
    async fn cancel_declined_by_store_keeps_cache() {
        let remote = Arc::new(MockReservationStore::new());
        let (coordinator, _) = coordinator(&remote);
        let local_only = reservation(offset(1), "5ta", "Cañón");
        coordinator.cache().add(local_only.clone());

        assert!(!coordinator.cancel(local_only.id).await.unwrap());
        assert_eq!(coordinator.cache().get(local_only.id), Some(local_only));
    }
}

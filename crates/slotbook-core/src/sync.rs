//! Sync protocol
//!
//! Pulls the full reservation set from the Reservation Store and replaces
//! the local cache with it. Never merges: a failed sync leaves the cache
//! exactly as it was.

use chrono::NaiveDate;
use serde::Serialize;
use slotbook_api::{Reservation, StoreRecord};
use slotbook_remote::ReservationStore;
use slotbook_util::{Result, RetryPolicy, SlotbookError, retry_with_backoff};
use tracing::{debug, info, warn};

use crate::ReservationCache;

/// Outcome of an accepted snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Reservations now in the cache
    pub kept: usize,
    /// Records dropped as past or unparseable
    pub discarded: usize,
    pub attempts: u32,
}

/// Normalize server records, keeping only parseable, non-past reservations
pub fn accept_records(records: Vec<StoreRecord>, today: NaiveDate) -> (Vec<Reservation>, usize) {
    let total = records.len();
    let kept: Vec<Reservation> = records
        .iter()
        .filter_map(|record| match record.normalize() {
            Ok(reservation) if reservation.is_active(today) => Some(reservation),
            Ok(reservation) => {
                debug!(reservation_id = %reservation.id, date = %reservation.date, "Dropping past reservation");
                None
            }
            Err(e) => {
                debug!(error = %e, "Dropping unparseable store record");
                None
            }
        })
        .collect();

    let discarded = total - kept.len();
    (kept, discarded)
}

/// Fetch the full snapshot with retry, then swap it into the cache
pub async fn synchronize(
    remote: &dyn ReservationStore,
    cache: &ReservationCache,
    policy: &RetryPolicy,
    today: NaiveDate,
) -> Result<SyncReport> {
    let mut attempts = 0;
    let fetched = retry_with_backoff(policy, "sync", |attempt| {
        attempts = attempt;
        async move { remote.fetch_all().await.map_err(SlotbookError::from) }
    })
    .await;

    let records = match fetched {
        Ok(records) => records,
        Err(failure) => {
            warn!(attempts = failure.attempts, error = %failure.last, "Sync degraded, keeping local cache");
            return Err(SlotbookError::SyncDegraded {
                attempts: failure.attempts,
            });
        }
    };

    let (reservations, discarded) = accept_records(records, today);
    let kept = reservations.len();
    cache.replace_all(reservations);

    info!(kept, discarded, attempts, "Sync completed");
    Ok(SyncReport {
        kept,
        discarded,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{day, reservation};
    use serde_json::json;
    use slotbook_remote::MockReservationStore;
    use slotbook_store::SqliteStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1)).with_attempt_timeout(Duration::from_secs(1))
    }

    fn cache() -> ReservationCache {
        ReservationCache::load(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn replaces_cache_with_active_snapshot() {
        let today = day(0);
        let remote = MockReservationStore::new().with_reservations([
            reservation(day(-1), "1era", "Cañón"),
            reservation(today, "2da", "Cañón"),
            reservation(day(2), "3era", "TV Planta Alta"),
        ]);
        let cache = cache();
        cache.add(reservation(day(4), "1era", "Salón 10"));

        let report = synchronize(&remote, &cache, &policy(), today).await.unwrap();
        assert_eq!(report.kept, 2);
        assert_eq!(report.discarded, 1);
        assert_eq!(report.attempts, 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.all().iter().all(|r| r.resource.as_str() != "Salón 10"));
    }

    #[tokio::test]
    async fn normalizes_timestamps_and_drops_garbage() {
        let today = day(0);
        let remote = MockReservationStore::new();
        remote.push_raw_record(
            serde_json::from_value(json!({
                "id": "99",
                "fecha": "2030-05-08T12:00:00.000Z",
                "turno": "matutino",
                "hora": "1era",
                "recurso": "Cañón",
            }))
            .unwrap(),
        );
        remote.push_raw_record(
            serde_json::from_value(json!({ "id": 100, "fecha": "pronto", "turno": "matutino" }))
                .unwrap(),
        );

        let cache = cache();
        let report = synchronize(&remote, &cache, &policy(), today).await.unwrap();
        assert_eq!(report.kept, 1);
        assert_eq!(report.discarded, 1);
        assert_eq!(cache.all()[0].date, day(2));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let remote = MockReservationStore::new().with_reservations([reservation(day(1), "1era", "Cañón")]);
        remote.set_fail_fetches(2);

        let cache = cache();
        let report = synchronize(&remote, &cache, &policy(), day(0)).await.unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_cache_untouched() {
        let remote = MockReservationStore::new();
        remote.set_unreachable(true);

        let cache = cache();
        let existing = reservation(day(-1), "1era", "Cañón");
        cache.add(existing.clone());

        let result = synchronize(&remote, &cache, &policy(), day(0)).await;
        assert!(matches!(result, Err(SlotbookError::SyncDegraded { attempts: 3 })));
        assert_eq!(remote.fetch_count(), 3);
        assert_eq!(cache.all(), vec![existing]);
    }
}

//! Integration tests for slotbook
//!
//! These drive the coordinator end to end against the in-memory Reservation
//! Store and a real SQLite mirror.

use chrono::NaiveDate;
use slotbook_api::{BookingOutcome, BookingRequest, Reservation, Shift};
use slotbook_config::{CreationMode, Settings, load_config};
use slotbook_core::{Connectivity, Coordinator, CoreEvent};
use slotbook_remote::MockReservationStore;
use slotbook_store::{AuditEventType, SqliteStore, Store};
use slotbook_util::{RetryPolicy, SlotbookError};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn make_test_settings() -> Settings {
    let mut settings = Settings::with_endpoint("https://store.example/exec");
    settings.sync.retry =
        RetryPolicy::new(3, Duration::from_millis(1)).with_attempt_timeout(Duration::from_secs(1));
    settings.booking.retry = RetryPolicy::new(3, Duration::from_millis(1));
    settings.store.request_timeout = Duration::from_secs(1);
    settings
}

fn days_from_today(days: i64) -> NaiveDate {
    slotbook_util::today() + chrono::Duration::days(days)
}

fn booking(date: NaiveDate, start: &str, duration: usize, resource: &str) -> BookingRequest {
    BookingRequest {
        date,
        shift: Shift::Morning,
        start_hour: start.into(),
        duration,
        resource: resource.into(),
        first_name: "Marta".into(),
        last_name: "Gómez".into(),
    }
}

/// Reservation another client already made
fn existing(id: i64, date: NaiveDate, hour: &str, resource: &str) -> Reservation {
    let mut reservation =
        booking(date, hour, 1, resource).reservation_for(hour.into(), id.into(), slotbook_util::now());
    reservation.first_name = "Luis".into();
    reservation
}

#[tokio::test]
async fn test_sync_then_book_around_other_clients() {
    let tomorrow = days_from_today(1);
    let remote = Arc::new(MockReservationStore::new().with_reservations([
        existing(1, tomorrow, "2da", "Cañón"),
        existing(2, days_from_today(-3), "1era", "Cañón"),
    ]));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let coordinator = Coordinator::new(make_test_settings(), remote.clone(), store);

    assert!(coordinator.synchronize().await);
    assert_eq!(coordinator.active_reservations().len(), 1);

    // The synced reservation blocks any range that touches it
    let availability = coordinator
        .check_availability(tomorrow, Shift::Morning, &"1era".into(), 2)
        .unwrap();
    assert_eq!(availability.is_occupied(&"Cañón".into()), Some(true));
    assert_eq!(availability.available().count(), 5);

    let blocked = coordinator
        .book(&booking(tomorrow, "1era", 2, "Cañón"))
        .await
        .unwrap();
    assert_eq!(blocked.outcome, BookingOutcome::Conflict);
    assert!(remote.create_calls().is_empty());

    let booked = coordinator
        .book(&booking(tomorrow, "3era", 2, "Cañón"))
        .await
        .unwrap();
    assert_eq!(booked.outcome, BookingOutcome::Success);
    assert_eq!(coordinator.active_reservations().len(), 3);
    assert_eq!(remote.stored().len(), 4);
}

#[tokio::test]
async fn test_store_arbitrates_when_local_view_is_stale() {
    let tomorrow = days_from_today(1);

    // Another client holds the second hour; this client never synced
    let remote_with_rival = Arc::new(
        MockReservationStore::new().with_reservations([existing(9, tomorrow, "2da", "TV 43\"")]),
    );
    let mut settings = make_test_settings();
    settings.booking.lock_ttl = None;
    settings.booking.remote_precheck = false;
    let coordinator = Coordinator::new(
        settings,
        remote_with_rival.clone(),
        Arc::new(SqliteStore::in_memory().unwrap()),
    );

    let report = coordinator
        .book(&booking(tomorrow, "1era", 3, "TV 43\""))
        .await
        .unwrap();
    assert_eq!(report.outcome, BookingOutcome::PartialSuccess);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.missing_hours().len(), 2);
    // Sequential creation stops at the rejected hour
    assert_eq!(remote_with_rival.create_calls().len(), 2);
    assert_eq!(coordinator.active_reservations().len(), 1);
}

#[tokio::test]
async fn test_concurrent_creation_mode() {
    let tomorrow = days_from_today(1);
    let remote = Arc::new(
        MockReservationStore::new().with_reservations([existing(9, tomorrow, "2da", "Cañón")]),
    );
    let mut settings = make_test_settings();
    settings.booking.lock_ttl = None;
    settings.booking.remote_precheck = false;
    settings.booking.creation = CreationMode::Concurrent;
    let coordinator = Coordinator::new(
        settings,
        remote.clone(),
        Arc::new(SqliteStore::in_memory().unwrap()),
    );

    let report = coordinator
        .book(&booking(tomorrow, "1era", 3, "Cañón"))
        .await
        .unwrap();
    assert_eq!(report.outcome, BookingOutcome::PartialSuccess);
    assert_eq!(report.created.len(), 2);
    assert_eq!(remote.create_calls().len(), 3);
}

#[tokio::test]
async fn test_offline_client_keeps_working_from_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("slotbook.db");
    let tomorrow = days_from_today(1);

    {
        let remote = Arc::new(MockReservationStore::new());
        let store = Arc::new(SqliteStore::open(&db_path).unwrap());
        let coordinator = Coordinator::new(make_test_settings(), remote, store);
        let report = coordinator
            .book(&booking(tomorrow, "4ta", 2, "TV Planta Alta"))
            .await
            .unwrap();
        assert_eq!(report.outcome, BookingOutcome::Success);
    }

    // Next start: the store is down, the mirror still answers queries
    let remote = Arc::new(MockReservationStore::new());
    remote.set_unreachable(true);
    let store = Arc::new(SqliteStore::open(&db_path).unwrap());
    let coordinator = Coordinator::new(make_test_settings(), remote.clone(), store.clone());
    let mut events = coordinator.subscribe();

    assert!(!coordinator.synchronize().await);
    assert!(matches!(
        coordinator.connectivity(),
        Connectivity::Degraded { attempts: 3, .. }
    ));
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::SyncDegraded { attempts: 3 }
    );

    assert_eq!(coordinator.active_reservations().len(), 2);
    let availability = coordinator
        .check_availability(tomorrow, Shift::Morning, &"5ta".into(), 1)
        .unwrap();
    assert_eq!(availability.is_occupied(&"TV Planta Alta".into()), Some(true));

    let report = coordinator
        .book(&booking(tomorrow, "1era", 1, "Cañón"))
        .await
        .unwrap();
    assert_eq!(report.outcome, BookingOutcome::Failure);
    assert_eq!(report.attempts, 3);

    let audits = store.get_recent_audits(50).unwrap();
    assert!(audits.iter().any(|a| matches!(
        a.event,
        AuditEventType::BookingSettled {
            outcome: BookingOutcome::Failure,
            created: 0,
            ..
        }
    )));
}

#[tokio::test]
async fn test_cancel_round_trip() {
    let tomorrow = days_from_today(1);
    let remote = Arc::new(MockReservationStore::new());
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let coordinator = Coordinator::new(make_test_settings(), remote.clone(), store);

    let report = coordinator
        .book(&booking(tomorrow, "6ta", 1, "Caja TV 50\""))
        .await
        .unwrap();
    let id = report.created[0].id;

    assert!(coordinator.cancel(id).await.unwrap());
    assert!(coordinator.active_reservations().is_empty());
    assert!(remote.stored().is_empty());

    assert!(matches!(
        coordinator.cancel(id).await,
        Err(SlotbookError::NotFound(_))
    ));
}

#[test]
fn test_report_over_builtin_catalog() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let coordinator = Coordinator::new(
        make_test_settings(),
        Arc::new(MockReservationStore::new()),
        store,
    );
    coordinator
        .cache()
        .add(existing(1, slotbook_util::today(), "1era", "Cañón"));
    coordinator
        .cache()
        .add(existing(2, days_from_today(2), "1era", "Cañón"));

    let report = coordinator.report();
    assert_eq!(report.total_active, 2);
    assert_eq!(report.today, 1);
    assert_eq!(report.free_slots, coordinator.catalog().daily_capacity() - 2);
    assert_eq!(report.per_resource.len(), 8);
}

#[test]
fn test_config_file_drives_settings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
config_version = 1

[store]
endpoint = "https://store.example/exec"
request_timeout_secs = 5

[booking]
lock = false
creation = "concurrent"

[sweep]
interval_secs = 60
"#
    )
    .unwrap();

    let settings = load_config(file.path()).unwrap();
    assert_eq!(settings.store.request_timeout, Duration::from_secs(5));
    assert_eq!(settings.booking.lock_ttl, None);
    assert_eq!(settings.booking.creation, CreationMode::Concurrent);
    assert_eq!(settings.sweep_interval, Duration::from_secs(60));
}

//! Shared fixtures for unit tests

use chrono::NaiveDate;
use slotbook_api::{BookingRequest, Reservation, Shift};
use slotbook_util::ReservationId;
use std::sync::atomic::{AtomicI64, Ordering};

static NEXT_ID: AtomicI64 = AtomicI64::new(1);

/// Fixed reference day, offset by `offset` days
pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 5, 6).unwrap() + chrono::Duration::days(offset)
}

/// Morning reservation with a unique id
pub fn reservation(date: NaiveDate, hour: &str, resource: &str) -> Reservation {
    shift_reservation(date, Shift::Morning, hour, resource)
}

pub fn shift_reservation(date: NaiveDate, shift: Shift, hour: &str, resource: &str) -> Reservation {
    let id = ReservationId::new(NEXT_ID.fetch_add(1, Ordering::SeqCst));
    request(date, shift, hour, 1, resource).reservation_for(hour.into(), id, slotbook_util::now())
}

pub fn request(
    date: NaiveDate,
    shift: Shift,
    start: &str,
    duration: usize,
    resource: &str,
) -> BookingRequest {
    BookingRequest {
        date,
        shift,
        start_hour: start.into(),
        duration,
        resource: resource.into(),
        first_name: "Ana".into(),
        last_name: "Pérez".into(),
    }
}

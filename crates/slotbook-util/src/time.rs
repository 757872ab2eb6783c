//! Clock utilities for slotbook
//!
//! Reservations are dated with a plain local calendar date (`YYYY-MM-DD`).
//! A reservation stays active for its whole day: only dates strictly before
//! today count as past.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `SLOTBOOK_MOCK_TIME` environment variable can be set
//! to override the system time for every date-sensitive operation.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-03-10 09:15:00`)
//!
//! Example:
//! ```bash
//! SLOTBOOK_MOCK_TIME="2025-03-10 09:15:00" slotbook list
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "SLOTBOOK_MOCK_TIME";

/// Canonical date format used on the wire and in the local mirror
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Offset between mock time and real time at process start.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Today's local calendar date.
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// True iff `date` is strictly before `today`. Same-day is never past.
pub fn is_past(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

/// Format a date in the canonical `YYYY-MM-DD` form.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a date the store may hand back.
///
/// Accepts the canonical `YYYY-MM-DD` form or a full RFC 3339 timestamp.
/// Timestamps are converted to the local calendar date, since the store
/// serializes local midnights as UTC instants.
pub fn parse_store_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    // Naive timestamps without an offset: keep the date part as written.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

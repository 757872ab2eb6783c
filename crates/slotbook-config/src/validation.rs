//! Configuration validation

use crate::schema::{RawBookingConfig, RawConfig, RawShift};
use crate::settings::CreationMode;
use slotbook_api::{SLOT_KEY_SEPARATOR, Shift};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Shift '{shift}': {message}")]
    ShiftError { shift: String, message: String },

    #[error("Unknown shift: {0}")]
    UnknownShift(String),

    #[error("Shift '{0}' is defined more than once")]
    DuplicateShift(String),

    #[error("Shift '{0}' is missing from the catalog")]
    MissingShift(String),

    #[error("Store config error: {0}")]
    StoreError(String),

    #[error("Sync config error: {0}")]
    SyncError(String),

    #[error("Booking config error: {0}")]
    BookingError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let endpoint = config.store.endpoint.trim();
    if endpoint.is_empty() {
        errors.push(ValidationError::StoreError("endpoint cannot be empty".into()));
    } else if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        errors.push(ValidationError::StoreError(format!(
            "endpoint must be an http(s) URL, got '{}'",
            endpoint
        )));
    }
    if config.store.request_timeout_secs == Some(0) {
        errors.push(ValidationError::StoreError(
            "request_timeout_secs must be positive".into(),
        ));
    }

    if config.sync.max_retries == Some(0) {
        errors.push(ValidationError::SyncError("max_retries must be at least 1".into()));
    }
    if config.sync.timeout_secs == Some(0) {
        errors.push(ValidationError::SyncError("timeout_secs must be positive".into()));
    }

    errors.extend(validate_booking(&config.booking));

    if !config.shifts.is_empty() {
        errors.extend(validate_shifts(&config.shifts));
    }

    errors
}

fn validate_booking(booking: &RawBookingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if booking.max_attempts == Some(0) {
        errors.push(ValidationError::BookingError(
            "max_attempts must be at least 1".into(),
        ));
    }
    if booking.lock_ttl_secs == Some(0) {
        errors.push(ValidationError::BookingError("lock_ttl_secs must be positive".into()));
    }
    if let Some(mode) = &booking.creation
        && CreationMode::parse(mode).is_none()
    {
        errors.push(ValidationError::BookingError(format!(
            "creation must be 'sequential' or 'concurrent', got '{}'",
            mode
        )));
    }
    if let Some(backoff) = &booking.backoff
        && !matches!(backoff.to_lowercase().as_str(), "linear" | "exponential")
    {
        errors.push(ValidationError::BookingError(format!(
            "backoff must be 'linear' or 'exponential', got '{}'",
            backoff
        )));
    }

    errors
}

fn validate_shifts(shifts: &[RawShift]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for raw in shifts {
        match raw.shift.parse::<Shift>() {
            Ok(shift) => {
                if !seen.insert(shift) {
                    errors.push(ValidationError::DuplicateShift(shift.to_string()));
                }
                errors.extend(validate_shift(raw, shift));
            }
            Err(_) => errors.push(ValidationError::UnknownShift(raw.shift.clone())),
        }
    }

    for shift in Shift::ALL {
        if !seen.contains(&shift) {
            errors.push(ValidationError::MissingShift(shift.to_string()));
        }
    }

    errors
}

fn validate_shift(raw: &RawShift, shift: Shift) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let shift_error = |message: String| ValidationError::ShiftError {
        shift: shift.to_string(),
        message,
    };

    if raw.hours.is_empty() {
        errors.push(shift_error("hours cannot be empty".into()));
    }
    if raw.resources.is_empty() {
        errors.push(shift_error("resources cannot be empty".into()));
    }

    for (kind, values) in [("hour", &raw.hours), ("resource", &raw.resources)] {
        let mut seen = HashSet::new();
        for value in values {
            let value = value.trim();
            if value.is_empty() {
                errors.push(shift_error(format!("empty {} name", kind)));
            } else if value.contains(SLOT_KEY_SEPARATOR) {
                errors.push(shift_error(format!(
                    "{} '{}' contains the reserved character '{}'",
                    kind, value, SLOT_KEY_SEPARATOR
                )));
            }
            if !seen.insert(value) {
                errors.push(shift_error(format!("duplicate {} '{}'", kind, value)));
            }
        }
    }

    errors
}

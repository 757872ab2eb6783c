//! Validated settings structures

use crate::catalog::{Catalog, ShiftCatalog};
use crate::schema::{RawBookingConfig, RawConfig, RawShift, RawStoreConfig, RawSyncConfig};
use slotbook_api::Shift;
use slotbook_util::{Backoff, RetryPolicy, default_data_dir};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Validated settings ready for use by the booking core
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientSettings,
    pub store: StoreSettings,
    pub sync: SyncSettings,
    pub booking: BookingSettings,
    /// How often the expiry sweeper runs in long-running mode
    pub sweep_interval: Duration,
    pub catalog: Catalog,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let catalog = convert_catalog(&raw.shifts);

        Self {
            client: ClientSettings {
                data_dir: raw.client.data_dir.unwrap_or_else(default_data_dir),
            },
            store: convert_store(raw.store),
            sync: convert_sync(raw.sync),
            booking: convert_booking(raw.booking),
            sweep_interval: Duration::from_secs(raw.sweep.interval_secs.unwrap_or(300)),
            catalog,
        }
    }

    /// Settings for talking to `endpoint` with every other value defaulted
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: ClientSettings {
                data_dir: default_data_dir(),
            },
            store: StoreSettings {
                endpoint: endpoint.into(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            sync: SyncSettings::default(),
            booking: BookingSettings::default(),
            sweep_interval: Duration::from_secs(300),
            catalog: Catalog::builtin(),
        }
    }
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub data_dir: PathBuf,
}

/// Reservation Store connection
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub endpoint: String,
    /// Bound for a single store call
    pub request_timeout: Duration,
}

/// Sync protocol budget
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Attempts, exponential backoff and per-attempt timeout
    pub retry: RetryPolicy,
    pub interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(3, Duration::from_secs(1))
                .with_attempt_timeout(Duration::from_secs(10)),
            interval: Duration::from_secs(300),
        }
    }
}

/// How per-hour create calls are issued within one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreationMode {
    /// Ascending hour order, awaited one by one, stop at the first failure
    #[default]
    Sequential,
    /// All hours at once, every result counted
    Concurrent,
}

impl CreationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Some(CreationMode::Sequential),
            "concurrent" => Some(CreationMode::Concurrent),
            _ => None,
        }
    }
}

/// Booking protocol settings
#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// Whole-transaction retry budget for communication failures
    pub retry: RetryPolicy,
    /// Lock TTL; `None` disables the lock phase
    pub lock_ttl: Option<Duration>,
    pub creation: CreationMode,
    /// Separate `check` call before creating slots. Only used with the lock
    /// disabled: lock-and-check already answers availability.
    pub remote_precheck: bool,
    pub local_fast_path: bool,
}

impl BookingSettings {
    /// Whether a transaction issues its own `check` call
    pub fn uses_remote_precheck(&self) -> bool {
        self.lock_ttl.is_none() && self.remote_precheck
    }

    /// How availability is confirmed with the store before creating slots
    pub fn precheck_summary(&self) -> &'static str {
        if self.lock_ttl.is_some() {
            "via lock"
        } else if self.remote_precheck {
            "remote check"
        } else {
            "off"
        }
    }
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(3, Duration::from_millis(500)),
            lock_ttl: Some(Duration::from_secs(30)),
            creation: CreationMode::Sequential,
            remote_precheck: true,
            local_fast_path: true,
        }
    }
}

// Conversion helpers

fn convert_store(raw: RawStoreConfig) -> StoreSettings {
    StoreSettings {
        endpoint: raw.endpoint.trim().to_string(),
        request_timeout: raw
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
    }
}

fn convert_sync(raw: RawSyncConfig) -> SyncSettings {
    let defaults = SyncSettings::default();
    let timeout = raw
        .timeout_secs
        .map(Duration::from_secs)
        .or(defaults.retry.attempt_timeout)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    SyncSettings {
        retry: RetryPolicy::new(
            raw.max_retries.unwrap_or(defaults.retry.max_attempts),
            raw.base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
        )
        .with_attempt_timeout(timeout),
        interval: raw
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval),
    }
}

fn convert_booking(raw: RawBookingConfig) -> BookingSettings {
    let defaults = BookingSettings::default();
    let backoff = match raw.backoff.as_deref().map(str::to_lowercase).as_deref() {
        Some("linear") => Backoff::Linear,
        _ => Backoff::Exponential,
    };

    let lock_ttl = if raw.lock.unwrap_or(true) {
        Some(
            raw.lock_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),
        )
    } else {
        None
    };

    BookingSettings {
        retry: RetryPolicy::new(
            raw.max_attempts.unwrap_or(defaults.retry.max_attempts),
            raw.base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
        )
        .with_backoff(backoff),
        lock_ttl,
        creation: raw
            .creation
            .as_deref()
            .and_then(CreationMode::parse)
            .unwrap_or_default(),
        remote_precheck: raw.remote_precheck.unwrap_or(defaults.remote_precheck),
        local_fast_path: raw.local_fast_path.unwrap_or(defaults.local_fast_path),
    }
}

fn convert_catalog(raw: &[RawShift]) -> Catalog {
    if raw.is_empty() {
        debug!("No shifts configured, using the built-in catalog");
        return Catalog::builtin();
    }

    let find = |shift: Shift| {
        raw.iter()
            .find(|s| s.shift.parse::<Shift>().ok() == Some(shift))
            .map(|s| {
                ShiftCatalog::new(
                    s.hours.iter().map(|h| h.trim()),
                    s.resources.iter().map(|r| r.trim()),
                )
            })
    };

    let builtin = Catalog::builtin();
    Catalog::new(
        find(Shift::Morning).unwrap_or_else(|| builtin.shift(Shift::Morning).clone()),
        find(Shift::Evening).unwrap_or_else(|| builtin.shift(Shift::Evening).clone()),
    )
}

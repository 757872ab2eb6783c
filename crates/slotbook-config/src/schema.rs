//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Local client settings
    #[serde(default)]
    pub client: RawClientConfig,

    /// Reservation Store connection
    pub store: RawStoreConfig,

    #[serde(default)]
    pub sync: RawSyncConfig,

    #[serde(default)]
    pub booking: RawBookingConfig,

    #[serde(default)]
    pub sweep: RawSweepConfig,

    /// Shift catalog; the built-in catalog is used when empty
    #[serde(default)]
    pub shifts: Vec<RawShift>,
}

/// Client-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawClientConfig {
    /// Data directory for the local mirror
    pub data_dir: Option<PathBuf>,
}

/// Reservation Store endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawStoreConfig {
    /// Base URL of the store web app
    pub endpoint: String,

    /// Timeout for a single store call, in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Sync protocol settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSyncConfig {
    /// Fetch attempts before giving up (default 3)
    pub max_retries: Option<u32>,

    /// Delay after the first failed attempt, doubled each time
    pub base_delay_ms: Option<u64>,

    /// Upper bound for one fetch attempt, in seconds
    pub timeout_secs: Option<u64>,

    /// Interval between background syncs in long-running mode
    pub interval_secs: Option<u64>,
}

/// Booking protocol settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBookingConfig {
    /// Whole-transaction attempts on communication failure (default 3)
    pub max_attempts: Option<u32>,

    pub base_delay_ms: Option<u64>,

    /// "exponential" or "linear"
    pub backoff: Option<String>,

    /// Acquire a store-side lock around slot creation
    pub lock: Option<bool>,

    pub lock_ttl_secs: Option<u64>,

    /// "sequential" (stop at first failure) or "concurrent" (attempt all)
    pub creation: Option<String>,

    /// Ask the store for live availability before creating slots
    pub remote_precheck: Option<bool>,

    /// Reject requests the local cache already shows as occupied
    pub local_fast_path: Option<bool>,
}

/// Expiry sweeper settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSweepConfig {
    pub interval_secs: Option<u64>,
}

/// One shift of the catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawShift {
    /// "morning"/"matutino" or "evening"/"vespertino"
    pub shift: String,

    /// Ordered hour labels; order defines adjacency
    pub hours: Vec<String>,

    pub resources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [client]
            data_dir = "/var/lib/slotbook"

            [store]
            endpoint = "https://store.example/exec"
            request_timeout_secs = 5

            [sync]
            max_retries = 4
            interval_secs = 120

            [booking]
            lock = false
            creation = "concurrent"

            [[shifts]]
            shift = "morning"
            hours = ["1st", "2nd", "3rd"]
            resources = ["Projector"]

            [[shifts]]
            shift = "evening"
            hours = ["0", "1st"]
            resources = ["Projector", "Lab"]
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.shifts.len(), 2);
        assert_eq!(config.sync.max_retries, Some(4));
        assert_eq!(config.booking.creation.as_deref(), Some("concurrent"));
        assert_eq!(config.store.request_timeout_secs, Some(5));
    }

    #[test]
    fn store_section_is_required() {
        let result: Result<RawConfig, _> = toml::from_str("config_version = 1");
        assert!(result.is_err());
    }
}

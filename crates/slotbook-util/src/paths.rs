//! Default paths for slotbook
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/slotbook/config.toml` or `~/.config/slotbook/config.toml`
//! - Data: `$XDG_DATA_HOME/slotbook` or `~/.local/share/slotbook`

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const SLOTBOOK_DATA_DIR_ENV: &str = "SLOTBOOK_DATA_DIR";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Mirror database filename within the data directory
pub const MIRROR_DB_FILENAME: &str = "slotbook.db";

/// Application subdirectory name
const APP_DIR: &str = "slotbook";

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$SLOTBOOK_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/slotbook` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/slotbook` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(SLOTBOOK_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking SLOTBOOK_DATA_DIR env var.
/// Used for default values in configs where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

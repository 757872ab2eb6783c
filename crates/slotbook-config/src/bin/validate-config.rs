//! Config validation CLI tool
//!
//! Validates a slotbook configuration file and reports any errors.

use slotbook_api::Shift;
use slotbook_util::{default_config_path, is_mock_time_active};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a slotbook configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match slotbook_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", slotbook_config::CURRENT_CONFIG_VERSION);
            println!("  Store endpoint: {}", settings.store.endpoint);
            println!(
                "  Booking: {:?} creation, lock {}",
                settings.booking.creation,
                match settings.booking.lock_ttl {
                    Some(ttl) => format!("{}s TTL", ttl.as_secs()),
                    None => "disabled".to_string(),
                }
            );
            println!("  Availability precheck: {}", settings.booking.precheck_summary());
            println!("  Daily capacity: {} slots", settings.catalog.daily_capacity());
            if is_mock_time_active() {
                println!("  Mock time: active ({})", slotbook_util::now().format("%Y-%m-%d %H:%M"));
            }

            println!();
            println!("Shifts:");
            for shift in Shift::ALL {
                let hours: Vec<&str> = settings
                    .catalog
                    .hour_sequence(shift)
                    .iter()
                    .map(|h| h.as_str())
                    .collect();
                println!("  - {} [{}]", shift, hours.join(", "));
                for resource in settings.catalog.resource_catalog(shift) {
                    println!("      {}", resource);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                slotbook_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                slotbook_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                slotbook_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                slotbook_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        slotbook_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

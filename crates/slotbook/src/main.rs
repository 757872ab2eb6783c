//! slotbook - shared resource booking client
//!
//! This is the command-line UI shell over the booking core.
//! It wires together:
//! - Configuration loading
//! - Durable mirror and audit log
//! - Reservation Store client
//! - Booking coordinator
//! - Long-running sync and sweep loop

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use slotbook_api::{BookingOutcome, BookingReport, BookingRequest, HourLabel, Reservation, Resource, Shift};
use slotbook_config::load_config;
use slotbook_core::{AvailabilityReport, Coordinator, CoreEvent, UsageReport};
use slotbook_remote::HttpReservationStore;
use slotbook_store::{SqliteStore, Store};
use slotbook_util::{MIRROR_DB_FILENAME, ReservationId, SlotbookError, default_config_path};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// slotbook - Book shared resources by shift and hour
#[derive(Parser, Debug)]
#[command(name = "slotbook")]
#[command(about = "Book shared resources by shift and hour", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/slotbook/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set SLOTBOOK_DATA_DIR env var)
    #[arg(short, long, env = "SLOTBOOK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Work from the local cache without syncing first
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the local cache from the Reservation Store
    Sync,

    /// List active reservations
    List {
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        resource: Option<Resource>,
    },

    /// Show which resources are free for a range of hours
    Check {
        date: NaiveDate,
        shift: Shift,
        start: HourLabel,

        #[arg(short = 'n', long, default_value_t = 1)]
        duration: usize,
    },

    /// Book a resource for one or more consecutive hours
    Book {
        date: NaiveDate,
        shift: Shift,
        start: HourLabel,
        resource: Resource,

        #[arg(short = 'n', long, default_value_t = 1)]
        duration: usize,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },

    /// Cancel a reservation by id
    Cancel { id: ReservationId },

    /// Remove reservations dated before today
    Sweep,

    /// Usage statistics over active reservations
    Report,

    /// Keep syncing and sweeping until interrupted
    Run,
}

impl Command {
    /// Commands that read or change reservations start from a fresh snapshot
    fn wants_sync(&self) -> bool {
        !matches!(self, Command::Sync | Command::Sweep | Command::Run)
    }
}

/// Client state for one invocation
struct Client {
    coordinator: Coordinator,
    json: bool,
}

impl Client {
    fn new(args: &Args) -> Result<Self> {
        let settings = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            endpoint = %settings.store.endpoint,
            "Configuration loaded"
        );

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.client.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(MIRROR_DB_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        let remote = Arc::new(
            HttpReservationStore::new(&settings.store.endpoint, settings.store.request_timeout)
                .context("Failed to create Reservation Store client")?,
        );

        Ok(Self {
            coordinator: Coordinator::new(settings, remote, store),
            json: args.json,
        })
    }

    async fn execute(&self, command: Command, offline: bool) -> Result<()> {
        if command.wants_sync() && !offline && !self.coordinator.synchronize().await {
            eprintln!("warning: could not reach the Reservation Store, showing the local cache");
        }

        match command {
            Command::Sync => {
                let report = self.coordinator.try_synchronize().await?;
                self.print(&report, || {
                    format!(
                        "Synced: {} reservation(s) kept, {} discarded",
                        report.kept, report.discarded
                    )
                })
            }

            Command::List { date, resource } => {
                let reservations: Vec<Reservation> = self
                    .coordinator
                    .active_reservations()
                    .into_iter()
                    .filter(|r| date.is_none_or(|d| r.date == d))
                    .filter(|r| resource.as_ref().is_none_or(|res| &r.resource == res))
                    .collect();
                self.print(&reservations, || format_reservations(&reservations))
            }

            Command::Check {
                date,
                shift,
                start,
                duration,
            } => {
                let report = self
                    .coordinator
                    .check_availability(date, shift, &start, duration)?;
                self.print(&report, || format_availability(&report))
            }

            Command::Book {
                date,
                shift,
                start,
                resource,
                duration,
                first_name,
                last_name,
            } => {
                let request = BookingRequest {
                    date,
                    shift,
                    start_hour: start,
                    duration,
                    resource,
                    first_name,
                    last_name,
                };
                let report = self.coordinator.book(&request).await?;
                self.print(&report, || format_booking(&request, &report))?;

                match report.outcome {
                    BookingOutcome::Success | BookingOutcome::PartialSuccess => Ok(()),
                    BookingOutcome::Conflict => bail!("booking conflict"),
                    BookingOutcome::Failure => bail!("booking failed"),
                }
            }

            Command::Cancel { id } => match self.coordinator.cancel(id).await {
                Ok(true) => self.print(&true, || format!("Reservation {} cancelled", id)),
                Ok(false) => bail!("the Reservation Store declined to cancel {}", id),
                Err(SlotbookError::NotFound(_)) => {
                    bail!("reservation {} is not in the local cache; try `slotbook sync`", id)
                }
                Err(e) => Err(e.into()),
            },

            Command::Sweep => {
                let removed = self.coordinator.sweep();
                self.print(&removed, || format!("Removed {} expired reservation(s)", removed))
            }

            Command::Report => {
                let report = self.coordinator.report();
                self.print(&report, || format_usage(&report))
            }

            Command::Run => self.run().await,
        }
    }

    async fn run(&self) -> Result<()> {
        let settings = self.coordinator.settings();
        let mut events = self.coordinator.subscribe();

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        // First tick fires immediately, so the loop opens with a sync
        let mut sync_timer = tokio::time::interval(settings.sync.interval);
        let mut sweep_timer = tokio::time::interval(settings.sweep_interval);

        info!(
            sync_interval = ?settings.sync.interval,
            sweep_interval = ?settings.sweep_interval,
            "Client running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down");
                    break;
                }

                _ = sync_timer.tick() => {
                    if !self.coordinator.synchronize().await {
                        warn!(
                            connectivity = ?self.coordinator.connectivity(),
                            "Sync did not complete, working from the local cache"
                        );
                    }
                }

                _ = sweep_timer.tick() => {
                    self.coordinator.sweep();
                }

                event = events.recv() => match event {
                    Ok(event) => self.on_event(&event)?,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Client stopped");
        Ok(())
    }

    fn on_event(&self, event: &CoreEvent) -> Result<()> {
        debug!(event = ?event, "Core event");

        match event {
            CoreEvent::SyncCompleted { kept, discarded } => {
                info!(kept, discarded, "Cache refreshed");
            }
            CoreEvent::SyncDegraded { attempts } => {
                warn!(attempts, "Reservation Store unreachable, cache is stale");
            }
            CoreEvent::ReservationsExpired { removed } => {
                info!(removed, "Expired reservations removed");
            }
            CoreEvent::BookingSettled { .. } | CoreEvent::ReservationCancelled { .. } => {}
        }

        if self.json {
            println!("{}", serde_json::to_string(&EventLine::from(event))?);
        }
        Ok(())
    }

    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

/// Event as printed in long-running JSON mode
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventLine {
    SyncCompleted { kept: usize, discarded: usize },
    SyncDegraded { attempts: u32 },
    BookingSettled { resource: Resource, outcome: BookingOutcome, created: usize },
    ReservationCancelled { reservation_id: ReservationId },
    ReservationsExpired { removed: usize },
}

impl From<&CoreEvent> for EventLine {
    fn from(event: &CoreEvent) -> Self {
        match event {
            CoreEvent::SyncCompleted { kept, discarded } => EventLine::SyncCompleted {
                kept: *kept,
                discarded: *discarded,
            },
            CoreEvent::SyncDegraded { attempts } => EventLine::SyncDegraded {
                attempts: *attempts,
            },
            CoreEvent::BookingSettled {
                resource,
                outcome,
                created,
                ..
            } => EventLine::BookingSettled {
                resource: resource.clone(),
                outcome: *outcome,
                created: *created,
            },
            CoreEvent::ReservationCancelled { reservation_id } => {
                EventLine::ReservationCancelled {
                    reservation_id: *reservation_id,
                }
            }
            CoreEvent::ReservationsExpired { removed } => {
                EventLine::ReservationsExpired { removed: *removed }
            }
        }
    }
}

fn format_reservations(reservations: &[Reservation]) -> String {
    if reservations.is_empty() {
        return "No active reservations".into();
    }

    reservations
        .iter()
        .map(|r| {
            format!(
                "{:<14} {}  {:<8} {:<5} {:<22} {}",
                r.id,
                r.date,
                r.shift,
                r.hour,
                r.resource,
                r.requester()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_availability(report: &AvailabilityReport) -> String {
    let hours: Vec<&str> = report.hours.iter().map(HourLabel::as_str).collect();
    let mut out = format!(
        "{} {} hours {}:",
        report.date,
        report.shift,
        hours.join(", ")
    );
    for resource in &report.resources {
        let status = if resource.occupied { "occupied" } else { "free" };
        out.push_str(&format!("\n  {:<22} {}", resource.resource, status));
    }
    out
}

fn format_booking(request: &BookingRequest, report: &BookingReport) -> String {
    let list = |hours: Vec<&HourLabel>| {
        hours
            .iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match report.outcome {
        BookingOutcome::Success => format!(
            "Booked {} on {} ({}) for hours {}",
            request.resource,
            request.date,
            request.shift,
            list(report.created_hours())
        ),
        BookingOutcome::PartialSuccess => format!(
            "Partially booked {} on {}: got {}, missing {}. The created hours were kept.",
            request.resource,
            request.date,
            list(report.created_hours()),
            list(report.missing_hours())
        ),
        BookingOutcome::Conflict => format!(
            "{} is already reserved for part of that range on {}",
            request.resource, request.date
        ),
        BookingOutcome::Failure => format!(
            "Could not reach the Reservation Store after {} attempt(s): {}",
            report.attempts,
            report.message.as_deref().unwrap_or("no response")
        ),
    }
}

fn format_usage(report: &UsageReport) -> String {
    let mut out = format!(
        "Active reservations: {}\nToday: {}\nFree slots per day: {}\n\nBy resource:",
        report.total_active, report.today, report.free_slots
    );
    for (resource, count) in &report.per_resource {
        out.push_str(&format!("\n  {:<22} {}", resource, count));
    }
    out.push_str("\n\nBy shift:");
    for (shift, count) in &report.per_shift {
        out.push_str(&format!("\n  {:<22} {}", shift, count));
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "slotbook starting");

    let client = Client::new(&args)?;
    client.execute(args.command, args.offline).await
}

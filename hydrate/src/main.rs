//! hydrate - hydration tracker (main process)
//!
//! Owns the drink event store. Every write goes through one `Tracker`, which
//! publishes today's progress to the shared directory and absorbs widget
//! quick-adds on each reconcile tick.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/hydrate/data.db (~/.local/share/hydrate/data.db)
//! - Shared store: $XDG_DATA_HOME/hydrate/shared/ (or `sync.shared_dir`)
//! - Logs: $XDG_STATE_HOME/hydrate/hydrate.log.YYYY-MM-DD (daily rotation, UTC date)
//! - Config: $XDG_CONFIG_HOME/hydrate/config.toml (~/.config/hydrate/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use hydrate_core::analytics::StatsPeriod;
use hydrate_core::sync::{
    FileRefreshTrigger, FileSharedStore, ReconcileOutcome, RefreshWatcher, SyncBridge,
    APP_REFRESH_MARKER, WIDGET_REFRESH_MARKER,
};
use hydrate_core::{BeverageKind, Config, Database, EventOrigin, Tracker, VolumeUnit};
use process_lock::acquire_store_guard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type AppTracker = Tracker<FileSharedStore, FileRefreshTrigger, Local>;

#[derive(Parser)]
#[command(name = "hydrate")]
#[command(about = "Track daily hydration")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log a drink
    Add {
        /// Volume in milliliters
        volume_ml: i64,

        /// Beverage kind (water, coffee, tea, soda)
        #[arg(short, long, default_value = "water")]
        kind: BeverageKind,

        /// Record as a quick-add rather than a manual entry
        #[arg(long)]
        quick: bool,
    },

    /// List quick-add presets, or log the preset at INDEX
    Quick {
        /// Preset position as listed (1-based)
        index: Option<usize>,
    },

    /// Show today's progress and grid
    Today,

    /// Show statistics for a period
    Stats {
        /// week, month or year
        #[arg(short, long, default_value = "week")]
        period: StatsPeriod,
    },

    /// Show per-day totals
    History {
        /// Number of days ending today
        #[arg(short, long, default_value = "7")]
        days: u32,
    },

    /// Absorb pending widget changes once
    Reconcile,

    /// Reconcile continuously until Ctrl+C
    Watch {
        /// Poll interval in milliseconds (default: from config)
        #[arg(long)]
        poll: Option<u64>,
    },

    /// Delete every logged drink
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show effective configuration and paths
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = hydrate_core::logging::init(&config.logging, "hydrate")
        .context("failed to initialize logging")?;

    tracing::info!("hydrate starting");

    let db_path = Config::database_path();
    let unit = config.tracking.unit;

    match args.command {
        Command::Add {
            volume_ml,
            kind,
            quick,
        } => {
            let _guard = acquire_store_guard(&db_path).context("failed to acquire store lock")?;
            let tracker = open_tracker(&config)?;
            let origin = if quick {
                EventOrigin::QuickAdd
            } else {
                EventOrigin::ManualEntry
            };
            log_and_report(&tracker, unit, volume_ml, kind, origin)
        }
        Command::Quick { index: None } => {
            println!("Quick-add presets:");
            for (i, preset) in config.tracking.quick_selections.iter().enumerate() {
                println!(
                    "  {}. {} {}",
                    i + 1,
                    unit.format(preset.volume_ml),
                    preset.kind.display_name()
                );
            }
            Ok(())
        }
        Command::Quick { index: Some(index) } => {
            let preset = index
                .checked_sub(1)
                .and_then(|i| config.tracking.quick_selections.get(i))
                .copied()
                .with_context(|| format!("no quick-add preset at position {}", index))?;
            let _guard = acquire_store_guard(&db_path).context("failed to acquire store lock")?;
            let tracker = open_tracker(&config)?;
            log_and_report(
                &tracker,
                unit,
                preset.volume_ml,
                preset.kind,
                EventOrigin::QuickAdd,
            )
        }
        Command::Today => {
            let tracker = open_tracker(&config)?;
            print_today(&tracker, &config)
        }
        Command::Stats { period } => {
            let tracker = open_tracker(&config)?;
            print_stats(&tracker, unit, period)
        }
        Command::History { days } => {
            let tracker = open_tracker(&config)?;
            let history = tracker
                .history_at(Utc::now(), days)
                .context("failed to load history")?;
            let goal = tracker.goal_ml();
            for (date, total) in history {
                let mark = if total >= goal { "*" } else { " " };
                println!("{} {} {}", date, mark, unit.format(total));
            }
            Ok(())
        }
        Command::Reconcile => {
            let _guard = acquire_store_guard(&db_path).context("failed to acquire store lock")?;
            let tracker = open_tracker(&config)?;
            let mut outcome = tracker.reconcile().context("reconcile failed")?;
            if outcome == ReconcileOutcome::Deferred {
                // Give an in-flight widget publish one poll interval to land
                thread::sleep(Duration::from_millis(config.sync.poll_ms.max(1)));
                outcome = tracker.reconcile().context("reconcile failed")?;
            }
            println!("{}", describe_outcome(&outcome, unit));
            Ok(())
        }
        Command::Watch { poll } => {
            let _guard = acquire_store_guard(&db_path).context("failed to acquire store lock")?;
            let tracker = open_tracker(&config)?;
            let poll_ms = poll.unwrap_or(config.sync.poll_ms).max(1);
            run_watch_mode(&tracker, &config, poll_ms)
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete all drinks without --yes");
            }
            let _guard = acquire_store_guard(&db_path).context("failed to acquire store lock")?;
            let tracker = open_tracker(&config)?;
            let deleted = tracker.reset().context("failed to reset event store")?;
            println!("Deleted {} drink(s)", deleted);
            Ok(())
        }
        Command::Config => {
            print_config(&config);
            Ok(())
        }
    }
}

/// Open the database and shared store and wire them into a tracker.
fn open_tracker(config: &Config) -> Result<AppTracker> {
    let db_path = Config::database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory: {}", parent.display()))?;
    }

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let shared_dir = config.shared_dir();
    let store = FileSharedStore::open(&shared_dir)
        .with_context(|| format!("failed to open shared store: {}", shared_dir.display()))?;
    let refresh = FileRefreshTrigger::new(&shared_dir, WIDGET_REFRESH_MARKER);

    Ok(Tracker::new(
        db,
        SyncBridge::new(store, refresh),
        config.tracking.daily_goal_ml,
        Local,
    ))
}

fn log_and_report(
    tracker: &AppTracker,
    unit: VolumeUnit,
    volume_ml: i64,
    kind: BeverageKind,
    origin: EventOrigin,
) -> Result<()> {
    tracker
        .log_drink(volume_ml, kind, origin)
        .context("failed to log drink")?;
    let total = tracker
        .today_total_at(Utc::now())
        .context("failed to load today's total")?;
    println!(
        "Logged {} {}. Today: {} of {}",
        unit.format(volume_ml),
        kind.display_name(),
        unit.format(total),
        unit.format(tracker.goal_ml())
    );
    Ok(())
}

fn print_today(tracker: &AppTracker, config: &Config) -> Result<()> {
    let now = Utc::now();
    let unit = config.tracking.unit;
    let summary = tracker
        .summary_at(now, StatsPeriod::Week)
        .context("failed to compute progress")?;
    let grid = tracker
        .grid_at(now, config.grid.geometry(), config.grid.fill_strategy)
        .context("failed to build grid")?;

    println!(
        "Today: {} of {} ({:.0}%)",
        unit.format(summary.today_ml),
        unit.format(summary.goal_ml),
        summary.today_percentage
    );
    println!("Left:  {}", unit.format(summary.left_ml));
    println!("Streak: {} day(s)", summary.current_streak);
    println!();
    print!("{}", grid.render_text());
    Ok(())
}

fn print_stats(tracker: &AppTracker, unit: VolumeUnit, period: StatsPeriod) -> Result<()> {
    let summary = tracker
        .summary_at(Utc::now(), period)
        .context("failed to compute statistics")?;

    println!("{}", period.display_name());
    println!("  Average:        {}", unit.format(summary.average_ml.round() as i64));
    match summary.best_day_ml {
        Some(best) => println!("  Best day:       {}", unit.format(best)),
        None => println!("  Best day:       -"),
    }
    println!("  Goal reached:   {}% of days", summary.goal_rate);
    println!("  Current streak: {} day(s)", summary.current_streak);
    println!("  Longest streak: {} day(s)", summary.longest_streak);
    if !summary.breakdown.is_empty() {
        println!("  By beverage:");
        for (kind, volume) in &summary.breakdown {
            println!("    {:<8} {}", kind.display_name(), unit.format(*volume));
        }
    }
    Ok(())
}

fn describe_outcome(outcome: &ReconcileOutcome, unit: VolumeUnit) -> String {
    match outcome {
        ReconcileOutcome::Skipped => "Shared store unavailable; skipped".to_string(),
        ReconcileOutcome::InSync => "In sync".to_string(),
        ReconcileOutcome::Deferred => {
            "Shared total changed without the widget flag; waiting".to_string()
        }
        ReconcileOutcome::Corrected {
            event,
            flag_cleared: true,
        } => format!("Absorbed widget change: +{}", unit.format(event.volume_ml)),
        ReconcileOutcome::Corrected {
            event,
            flag_cleared: false,
        } => format!(
            "Absorbed widget change: +{} (widget flag not cleared)",
            unit.format(event.volume_ml)
        ),
        ReconcileOutcome::Republished { today_volume_ml } => {
            format!("Published today's total: {}", unit.format(*today_volume_ml))
        }
    }
}

/// Run continuous reconcile mode
fn run_watch_mode(tracker: &AppTracker, config: &Config, poll_ms: u64) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let poll_duration = Duration::from_millis(poll_ms);
    let mut wakeups = RefreshWatcher::new(&config.shared_dir(), APP_REFRESH_MARKER);
    let unit = config.tracking.unit;

    println!(
        "Watch mode active (poll every {}ms). Press Ctrl+C to stop.",
        poll_ms
    );

    let mut iteration = 0u64;
    let mut last_tick: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        // A widget wake-up runs the tick early
        let due = last_tick.map_or(true, |t| t.elapsed() >= poll_duration);
        if due || wakeups.poll() {
            iteration += 1;
            last_tick = Some(Instant::now());

            let outcome = tracker.reconcile().context("reconcile failed")?;
            if !matches!(
                outcome,
                ReconcileOutcome::InSync | ReconcileOutcome::Skipped | ReconcileOutcome::Deferred
            ) {
                let timestamp = Local::now().format("%H:%M:%S");
                println!("[{}] {}", timestamp, describe_outcome(&outcome, unit));
            }
            tracing::debug!(iteration, ?outcome, "watch reconcile iteration");
        }

        thread::sleep(poll_duration.min(Duration::from_millis(100)));
    }

    println!("Watch mode stopped.");
    tracing::info!("hydrate watch mode stopped");
    Ok(())
}

fn print_config(config: &Config) {
    println!("Config file:  {}", Config::config_path().display());
    println!("Database:     {}", Config::database_path().display());
    println!("Shared dir:   {}", config.shared_dir().display());
    println!(
        "Log file:     {}",
        hydrate_core::logging::log_file_path("hydrate", Utc::now().date_naive()).display()
    );
    println!();
    println!(
        "Daily goal:   {}",
        config.tracking.unit.format(config.tracking.daily_goal_ml)
    );
    println!(
        "Grid:         {}x{} ({:?})",
        config.grid.rows, config.grid.columns, config.grid.fill_strategy
    );
    println!("Wave:         {}", config.grid.wave_animation);
    println!("Poll:         {}ms", config.sync.poll_ms);
    println!("Reminders:    {}", config.notifications.enabled);
    println!("Log level:    {}", config.logging.level);
}

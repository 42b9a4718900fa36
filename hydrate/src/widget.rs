//! hydrate-widget - home-screen widget process
//!
//! Renders today's progress from the shared directory and performs
//! quick-adds by publishing a new shared total with the widget flag set.
//! Never opens the event store and never takes the store lock; the main
//! process absorbs quick-adds on its next reconcile tick.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Shared store: $XDG_DATA_HOME/hydrate/shared/ (or `sync.shared_dir`)
//! - Logs: $XDG_STATE_HOME/hydrate/hydrate-widget.log.YYYY-MM-DD
//! - Config: $XDG_CONFIG_HOME/hydrate/config.toml

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use hydrate_core::sync::{
    FileRefreshTrigger, FileSharedStore, RefreshWatcher, SyncBridge, APP_REFRESH_MARKER,
    WIDGET_REFRESH_MARKER,
};
use hydrate_core::{BeverageKind, Config, VolumeUnit, Widget, WidgetSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type AppWidget = Widget<FileSharedStore, FileRefreshTrigger, Local>;

#[derive(Parser)]
#[command(name = "hydrate-widget")]
#[command(about = "Hydration progress widget")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the current progress once
    Show {
        /// Wave animation phase
        #[arg(long, default_value = "0")]
        phase: f64,
    },

    /// Add a drink from the widget
    QuickAdd {
        /// Volume in milliliters
        volume_ml: i64,

        /// Beverage kind (water, coffee, tea, soda)
        #[arg(short, long, default_value = "water")]
        kind: BeverageKind,
    },

    /// Re-render on every timeline tick until Ctrl+C
    Watch {
        /// Poll interval in milliseconds (default: from config)
        #[arg(long)]
        poll: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = hydrate_core::logging::init(&config.logging, "hydrate-widget")
        .context("failed to initialize logging")?;

    tracing::info!("hydrate-widget starting");

    let widget = open_widget(&config)?;
    let unit = config.tracking.unit;

    match args.command {
        Command::Show { phase } => {
            let snapshot = widget
                .timeline_tick(Utc::now(), phase)
                .context("shared store unavailable")?;
            print_snapshot(&snapshot, unit);
            Ok(())
        }
        Command::QuickAdd { volume_ml, kind } => {
            let snapshot = widget
                .quick_add(Utc::now(), volume_ml, kind)
                .context("quick-add failed")?;
            println!("Added {} {}", unit.format(volume_ml), kind.display_name());
            print_snapshot(&snapshot, unit);
            Ok(())
        }
        Command::Watch { poll } => {
            let poll_ms = poll.unwrap_or(config.sync.poll_ms).max(1);
            run_watch_mode(&widget, &config, poll_ms)
        }
    }
}

fn open_widget(config: &Config) -> Result<AppWidget> {
    let shared_dir = config.shared_dir();
    let store = FileSharedStore::open(&shared_dir)
        .with_context(|| format!("failed to open shared store: {}", shared_dir.display()))?;
    let refresh = FileRefreshTrigger::new(&shared_dir, APP_REFRESH_MARKER);

    Ok(Widget::new(
        SyncBridge::new(store, refresh),
        config.grid.geometry(),
        config.grid.wave(),
        config.tracking.daily_goal_ml,
        Local,
    ))
}

fn print_snapshot(snapshot: &WidgetSnapshot, unit: VolumeUnit) {
    let pending = if snapshot.pending_sync {
        " (syncing)"
    } else {
        ""
    };
    println!(
        "{}: {} of {} ({:.0}%){}",
        snapshot.day,
        unit.format(snapshot.today_volume_ml),
        unit.format(snapshot.daily_goal_ml),
        snapshot.percentage,
        pending
    );
    print!("{}", snapshot.grid.render_text());
}

/// Timeline loop: one tick per poll, early on a main-process wake-up.
fn run_watch_mode(widget: &AppWidget, config: &Config, poll_ms: u64) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let poll_duration = Duration::from_millis(poll_ms);
    let mut wakeups = RefreshWatcher::new(&config.shared_dir(), WIDGET_REFRESH_MARKER);
    let unit = config.tracking.unit;
    let started = Instant::now();

    println!(
        "Widget watch active (poll every {}ms). Press Ctrl+C to stop.",
        poll_ms
    );

    let mut last_tick: Option<Instant> = None;
    let mut shown: Option<(i64, i64, bool)> = None;

    while running.load(Ordering::SeqCst) {
        let due = last_tick.map_or(true, |t| t.elapsed() >= poll_duration);
        if due || wakeups.poll() {
            last_tick = Some(Instant::now());
            let phase = started.elapsed().as_secs_f64();

            // Unreadable store: keep the previous render
            if let Some(snapshot) = widget.timeline_tick(Utc::now(), phase) {
                let key = (
                    snapshot.today_volume_ml,
                    snapshot.daily_goal_ml,
                    snapshot.pending_sync,
                );
                if shown != Some(key) {
                    print_snapshot(&snapshot, unit);
                    println!();
                    shown = Some(key);
                }
            }
        }

        thread::sleep(poll_duration.min(Duration::from_millis(100)));
    }

    println!("Widget watch stopped.");
    tracing::info!("hydrate-widget watch mode stopped");
    Ok(())
}

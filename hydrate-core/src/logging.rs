//! Logging infrastructure for hydrate
//!
//! Each process writes to its own daily-rotated file under
//! `~/.local/state/hydrate/` (`hydrate.log.YYYY-MM-DD`,
//! `hydrate-widget.log.YYYY-MM-DD`) following XDG standards, so the two
//! independently scheduled processes never interleave in one file.

use crate::config::{Config, LoggingConfig};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the logging system for `process`
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Log rotation
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig, process: &str) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();

    std::fs::create_dir_all(&log_dir)?;

    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &log_dir, log_file_prefix(process));

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        process,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

fn log_file_prefix(process: &str) -> String {
    format!("{}.log", process)
}

/// File `process` logs to on `day`
///
/// Daily rotation appends the UTC date: `<state_dir>/<process>.log.YYYY-MM-DD`.
pub fn log_file_path(process: &str, day: NaiveDate) -> PathBuf {
    Config::state_dir().join(format!(
        "{}.{}",
        log_file_prefix(process),
        day.format("%Y-%m-%d")
    ))
}

//! Counterpart refresh requests
//!
//! After publishing, a process asks its counterpart to re-run its tick
//! promptly. The request is a hint: if it fails the counterpart still polls
//! on its own schedule, so callers log and move on.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Marker the main process touches to wake the widget
pub const WIDGET_REFRESH_MARKER: &str = "widget.refresh";

/// Marker the widget touches to wake the main process
pub const APP_REFRESH_MARKER: &str = "app.refresh";

/// Something that can ask the other process to refresh.
pub trait RefreshTrigger: Send + Sync {
    fn request_refresh(&self) -> Result<()>;
}

/// Never wakes anyone; the counterpart relies on its own polling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRefresh;

impl RefreshTrigger for NoopRefresh {
    fn request_refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes a millisecond timestamp to a marker file the counterpart's watch
/// loop polls.
#[derive(Debug, Clone)]
pub struct FileRefreshTrigger {
    marker: PathBuf,
}

impl FileRefreshTrigger {
    /// Trigger for the marker named `marker` inside `shared_dir`.
    pub fn new(shared_dir: &Path, marker: &str) -> Self {
        Self {
            marker: shared_dir.join(marker),
        }
    }
}

impl RefreshTrigger for FileRefreshTrigger {
    fn request_refresh(&self) -> Result<()> {
        let stamp = chrono::Utc::now().timestamp_millis();
        fs::write(&self.marker, stamp.to_string()).map_err(|e| {
            Error::SharedStore(format!(
                "failed to touch refresh marker {}: {}",
                self.marker.display(),
                e
            ))
        })
    }
}

/// Read side of [`FileRefreshTrigger`]: reports when a new request arrived.
#[derive(Debug)]
pub struct RefreshWatcher {
    marker: PathBuf,
    last_seen: Option<String>,
}

impl RefreshWatcher {
    /// Watch `marker` inside `shared_dir`. A request written before the
    /// watcher was created does not count as new.
    pub fn new(shared_dir: &Path, marker: &str) -> Self {
        let marker = shared_dir.join(marker);
        let last_seen = fs::read_to_string(&marker).ok();
        Self { marker, last_seen }
    }

    /// True once per new refresh request.
    pub fn poll(&mut self) -> bool {
        let current = fs::read_to_string(&self.marker).ok();
        if current.is_some() && current != self.last_seen {
            self.last_seen = current;
            return true;
        }
        false
    }
}

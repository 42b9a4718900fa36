//! # hydrate-core
//!
//! Core library for hydrate - a hydration tracker split across a main
//! process and a home-screen widget process.
//!
//! This library provides:
//! - Domain types for drink events
//! - Event storage with SQLite
//! - Progress statistics over event snapshots
//! - Grid fill allocation for the progress display
//! - The publish/observe protocol both processes use to exchange progress
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! The two processes cannot call each other. They share one directory:
//! - **Main process** ([`Tracker`]): owns the event store, publishes today's
//!   total and absorbs widget quick-adds as corrective events
//! - **Widget process** ([`Widget`]): renders the shared total and publishes
//!   quick-adds with the widget flag set; never writes events
//!
//! ## Example
//!
//! ```rust,no_run
//! use hydrate_core::sync::{FileRefreshTrigger, FileSharedStore, SyncBridge, WIDGET_REFRESH_MARKER};
//! use hydrate_core::{BeverageKind, Config, Database, EventOrigin, Tracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let shared_dir = config.shared_dir();
//! let store = FileSharedStore::open(&shared_dir).expect("failed to open shared store");
//! let bridge = SyncBridge::new(store, FileRefreshTrigger::new(&shared_dir, WIDGET_REFRESH_MARKER));
//! let tracker = Tracker::new(db, bridge, config.tracking.daily_goal_ml, chrono::Local);
//!
//! tracker
//!     .log_drink(250, BeverageKind::Water, EventOrigin::ManualEntry)
//!     .expect("failed to log drink");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, DEFAULT_DAILY_GOAL_ML};
pub use db::Database;
pub use error::{Error, Result};
pub use tracker::Tracker;
pub use types::*;
pub use widget::{Widget, WidgetSnapshot};

// Public modules
pub mod analytics;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod grid;
pub mod logging;
pub mod sync;
pub mod tracker;
pub mod types;
pub mod widget;

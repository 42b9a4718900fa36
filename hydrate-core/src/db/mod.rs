//! Database layer for hydrate
//!
//! This module provides the event store using SQLite with:
//! - Schema migrations
//! - Append/range-query/reset operations on drink events

pub mod repo;
pub mod schema;

pub use repo::Database;

//! Error types for hydrate-core

use thiserror::Error;

/// Main error type for the hydrate-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Durable read/write against the event store failed
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error for shared store values
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A drink event failed validation before reaching the store
    #[error("invalid drink event: {0}")]
    InvalidEvent(String),

    /// Daily goal must be a positive number of milliliters
    #[error("invalid daily goal: {0} ml")]
    InvalidGoal(i64),

    /// The cross-process shared store could not be read or written
    #[error("shared store error: {0}")]
    SharedStore(String),
}

/// Result type alias for hydrate-core
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for calbench-store.

use std::path::PathBuf;

/// Result type for calbench-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in calbench-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Sensor not found in database.
    #[error("Sensor not found: {0}")]
    SensorNotFound(i64),

    /// Invalid timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

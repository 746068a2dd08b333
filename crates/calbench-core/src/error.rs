//! Error types for calbench-core.
//!
//! Two levels of failure are distinguished:
//!
//! | Error | Scope | Effect on a batch |
//! |-------|-------|-------------------|
//! | [`IngestError`] | One file | Counted as failed, batch continues, `last_sync` is not advanced |
//! | [`SyncError`] | One scan/sync call | The call returns early |
//!
//! Defective files and duplicate rows are outcomes, not errors. See
//! [`crate::FileStatus`].

use std::path::PathBuf;

use thiserror::Error;

use calbench_types::ParseError;

/// Per-file failure inside the ingest pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The file name does not follow the bench naming convention.
    #[error("Not a bench file: {0}")]
    UnknownKind(PathBuf),

    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// The record store rejected the write; nothing from the file was kept.
    #[error("Failed to store {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A defective file could not be moved to quarantine.
    #[error("Failed to move defective file {path} to {target}: {source}")]
    Quarantine {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Path of the file the error is attributed to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            IngestError::UnknownKind(path)
            | IngestError::Read { path, .. }
            | IngestError::Parse { path, .. }
            | IngestError::Persistence { path, .. }
            | IngestError::Quarantine { path, .. } => path,
        }
    }
}

/// Failure of a whole scan, sync or single-file operation.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The archive root is missing or not a directory.
    #[error("Archive root {path} is not accessible: {reason}")]
    ArchiveRoot { path: PathBuf, reason: String },

    /// Another scan, sync or ingest is already running on this engine.
    #[error("Another scan or sync is already running")]
    Busy,

    /// The checkpoint sidecar could not be read or written.
    #[error("Checkpoint file {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The background worker panicked or was aborted.
    #[error("Background worker failed: {0}")]
    Worker(String),

    /// A single-file ingest failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Worker(err.to_string())
    }
}

/// Result type alias using calbench-core's [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_path() {
        let err = IngestError::Parse {
            path: PathBuf::from("/archive/CH_FN_1.txt"),
            source: ParseError::NoReadings,
        };
        assert_eq!(err.path(), std::path::Path::new("/archive/CH_FN_1.txt"));
        assert_eq!(
            err.to_string(),
            "Failed to parse /archive/CH_FN_1.txt: No readings found"
        );
    }

    #[test]
    fn test_sync_error_wraps_ingest_transparently() {
        let err: SyncError = IngestError::UnknownKind(PathBuf::from("notes.txt")).into();
        assert_eq!(err.to_string(), "Not a bench file: notes.txt");
    }

    #[test]
    fn test_busy_display() {
        assert_eq!(
            SyncError::Busy.to_string(),
            "Another scan or sync is already running"
        );
    }
}

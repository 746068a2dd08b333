//! Archive scanning.
//!
//! Walks an archive directory tree and collects bench files newer than a
//! watermark. Quarantine directories are never entered.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use calbench_types::FileKind;

use crate::error::SyncError;
use crate::quarantine::DEFECT_DIR_NAME;

/// A bench file selected for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFile {
    pub path: PathBuf,
    pub kind: FileKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Which file timestamp is compared against the watermark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSource {
    /// Creation time, falling back to modification time where the
    /// platform does not record it.
    #[default]
    Created,
    Modified,
}

/// Options for [`scan_archive`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Keep files strictly newer than this; everything when `None`.
    pub since: Option<OffsetDateTime>,
    pub time_source: TimeSource,
    /// Directory names that are not descended into.
    pub skip_dirs: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            since: None,
            time_source: TimeSource::default(),
            skip_dirs: vec![DEFECT_DIR_NAME.to_string()],
        }
    }
}

/// Outcome of a directory walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Complete(Vec<IngestFile>),
    Cancelled,
}

/// Collect candidate bench files under `root`.
///
/// Candidates are sorted by timestamp, then path. Entries below the root
/// that cannot be read are logged and skipped. Cancellation is checked
/// before each entry.
///
/// # Errors
///
/// [`SyncError::ArchiveRoot`] if `root` does not exist, is not a
/// directory or cannot be listed.
pub fn scan_archive(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> Result<ScanOutcome, SyncError> {
    if !root.exists() {
        return Err(SyncError::ArchiveRoot {
            path: root.to_path_buf(),
            reason: "does not exist".to_string(),
        });
    }
    if !root.is_dir() {
        return Err(SyncError::ArchiveRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    info!("Scanning {}", root.display());
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !options
                    .skip_dirs
                    .iter()
                    .any(|name| entry.file_name() == name.as_str())
        });

    for entry in walker {
        if cancel.is_cancelled() {
            info!("Scan of {} cancelled", root.display());
            return Ok(ScanOutcome::Cancelled);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 || e.path() == Some(root) => {
                return Err(SyncError::ArchiveRoot {
                    path: root.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Error accessing directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(kind) = entry.file_name().to_str().and_then(FileKind::from_file_name) else {
            continue;
        };

        let created_at = match entry.metadata() {
            Ok(metadata) => match file_time(&metadata, options.time_source) {
                Some(at) => at,
                None => {
                    warn!("No timestamp for {}, skipping", entry.path().display());
                    continue;
                }
            },
            Err(e) => {
                warn!("Failed to read metadata for {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if options.since.is_some_and(|since| created_at <= since) {
            continue;
        }

        debug!("Candidate {} ({})", entry.path().display(), kind);
        files.push(IngestFile {
            path: entry.into_path(),
            kind,
            created_at,
        });
    }

    files.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.path.cmp(&b.path))
    });
    info!("Found {} candidate files", files.len());
    Ok(ScanOutcome::Complete(files))
}

fn file_time(metadata: &Metadata, source: TimeSource) -> Option<OffsetDateTime> {
    let time = match source {
        TimeSource::Created => metadata.created().or_else(|_| metadata.modified()),
        TimeSource::Modified => metadata.modified(),
    };
    time.ok().map(OffsetDateTime::from)
}

//! Scan and sync watermarks persisted next to the database.
//!
//! The sidecar is a plain `key=value` text file:
//!
//! ```text
//! LastScanDate=2024-05-02T10:15:00Z
//! LastSyncDate=2024-05-01T18:00:00Z
//! ```
//!
//! Values are written as RFC 3339. Older files carrying `DD.MM.YYYY` or
//! `DD.MM.YYYY hh:mm:ss` dates are still read, as UTC. Lines with other keys
//! are preserved on rewrite.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, Time};
use tracing::warn;

/// File name of the checkpoint sidecar.
pub const CHECKPOINT_FILE_NAME: &str = "db_info.txt";

const LAST_SCAN_KEY: &str = "LastScanDate";
const LAST_SYNC_KEY: &str = "LastSyncDate";

/// Persisted watermarks. `None` means the operation never completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub last_scan: Option<OffsetDateTime>,
    pub last_sync: Option<OffsetDateTime>,
}

/// Reads and updates the checkpoint sidecar.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Use the sidecar at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sidecar in the same directory as the database file.
    pub fn beside_database(db_path: &Path) -> Self {
        let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(CHECKPOINT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the sidecar exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the watermarks. A missing file yields empty watermarks.
    pub fn load(&self) -> io::Result<Checkpoint> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Checkpoint::default()),
            Err(e) => return Err(e),
        };

        let mut checkpoint = Checkpoint::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let slot = match key.trim() {
                LAST_SCAN_KEY => &mut checkpoint.last_scan,
                LAST_SYNC_KEY => &mut checkpoint.last_sync,
                _ => continue,
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match parse_watermark(value) {
                Some(at) => *slot = Some(at),
                None => warn!(
                    "Ignoring unreadable {} '{}' in {}",
                    key.trim(),
                    value,
                    self.path.display()
                ),
            }
        }
        Ok(checkpoint)
    }

    /// Create the sidecar with empty watermarks if it does not exist.
    ///
    /// Returns `true` when a new file was written.
    pub fn initialize(&self) -> io::Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(
            &self.path,
            format!("{LAST_SCAN_KEY}=\n{LAST_SYNC_KEY}=\n"),
        )?;
        Ok(true)
    }

    /// Record the start time of a completed scan.
    pub fn save_last_scan(&self, at: OffsetDateTime) -> io::Result<()> {
        self.update(LAST_SCAN_KEY, at)
    }

    /// Record the start time of a fully successful sync.
    pub fn save_last_sync(&self, at: OffsetDateTime) -> io::Result<()> {
        self.update(LAST_SYNC_KEY, at)
    }

    fn update(&self, key: &str, at: OffsetDateTime) -> io::Result<()> {
        let value = at
            .format(&Rfc3339)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let existing = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let mut found = false;
        let mut lines: Vec<String> = existing
            .lines()
            .map(|line| match line.split_once('=') {
                Some((k, _)) if k.trim() == key => {
                    found = true;
                    format!("{key}={value}")
                }
                _ => line.to_string(),
            })
            .collect();
        if !found {
            lines.push(format!("{key}={value}"));
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("txt.tmp");
        fs::write(&tmp, lines.join("\n") + "\n")?;
        fs::rename(&tmp, &self.path)
    }
}

/// Parse an RFC 3339 or legacy `DD.MM.YYYY[ hh:mm:ss]` watermark.
fn parse_watermark(value: &str) -> Option<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(at);
    }
    if let Ok(at) = PrimitiveDateTime::parse(
        value,
        format_description!(
            "[day padding:none].[month padding:none].[year] [hour padding:none]:[minute]:[second]"
        ),
    ) {
        return Some(at.assume_utc());
    }
    time::Date::parse(
        value,
        format_description!("[day padding:none].[month padding:none].[year]"),
    )
    .ok()
    .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
}

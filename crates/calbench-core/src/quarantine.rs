//! Quarantine of defective bench files.
//!
//! Rejected files are moved out of the archive tree into a `defect`
//! directory so that later scans never pick them up again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Name of the quarantine directory created next to defective files.
pub const DEFECT_DIR_NAME: &str = "defect";

/// Moves defective files into a quarantine directory.
#[derive(Debug, Clone, Default)]
pub struct Quarantine {
    root: Option<PathBuf>,
}

impl Quarantine {
    /// Quarantine into `root`, or next to each file when `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Directory a defective `file` is moved into.
    pub fn target_dir(&self, file: &Path) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFECT_DIR_NAME),
        }
    }

    /// Full destination path for `file`.
    pub fn target_path(&self, file: &Path) -> PathBuf {
        let dir = self.target_dir(file);
        match file.file_name() {
            Some(name) => dir.join(name),
            None => dir,
        }
    }

    /// Move `file` into quarantine and return its new path.
    ///
    /// The directory is created if needed and a same-named file already in
    /// quarantine is replaced. When a plain rename is impossible, for
    /// instance across filesystems, the file is copied and the original
    /// removed.
    pub fn move_file(&self, file: &Path) -> io::Result<PathBuf> {
        let target = self.target_path(file);
        if target == file {
            return Ok(target);
        }
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        if target.exists() {
            debug!("Replacing {} in quarantine", target.display());
            fs::remove_file(&target)?;
        }

        if let Err(e) = fs::rename(file, &target) {
            warn!(
                "Rename of {} failed ({}), copying instead",
                file.display(),
                e
            );
            fs::copy(file, &target)?;
            fs::remove_file(file)?;
        }
        Ok(target)
    }
}

//! Scan/sync orchestrator.
//!
//! [`SyncEngine`] runs archive scans and batch ingestion on a blocking
//! worker so that callers stay responsive. Only one operation runs per
//! engine at a time; a second call while busy fails with
//! [`SyncError::Busy`].
//!
//! # Checkpoints
//!
//! | Operation | Watermark advanced | Condition |
//! |-----------|--------------------|-----------|
//! | [`SyncEngine::scan`] | `last_scan` | walk completed (even with no files) |
//! | [`SyncEngine::sync`] | `last_sync` | not cancelled and no file failed |
//! | [`SyncEngine::process_single_file`] | none | |
//!
//! Both watermarks are set to the start time of the operation.
//!
//! # Example
//!
//! ```no_run
//! use calbench_core::{CheckpointStore, SyncEngine, Watermark};
//! use calbench_store::Store;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = calbench_store::default_db_path();
//! let engine = SyncEngine::new(Store::open(&db)?, CheckpointStore::beside_database(&db));
//!
//! let cancel = CancellationToken::new();
//! let scan = engine.scan("/srv/bench", Watermark::LastSync, cancel.clone()).await?;
//! let result = engine
//!     .sync(scan.files, cancel, |p| println!("{}/{}", p.processed, p.total))
//!     .await?;
//! println!("{} written, {} defective", result.written, result.defective);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use calbench_types::{DuplicationOutcome, RowCounts};

use crate::checkpoint::CheckpointStore;
use crate::error::{IngestError, Result, SyncError};
use crate::guard::BusyGuard;
use crate::ingest::{FileResult, FileStatus, Pipeline};
use crate::scan::{IngestFile, ScanOptions, ScanOutcome, scan_archive};
use crate::traits::RecordStore;

/// Lifecycle of the engine's current or most recent operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Scanning,
    ScanComplete,
    Syncing,
    SyncComplete,
    Cancelled,
}

/// Lower bound for the files a scan selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Watermark {
    /// Files created after the last completed scan.
    LastScan,
    /// Files created after the last fully successful sync.
    #[default]
    LastSync,
    /// Files created after a given time.
    Since(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// Every file.
    All,
}

/// Files found by a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub files: Vec<IngestFile>,
    pub cancelled: bool,
}

/// Progress after each processed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncProgress {
    pub processed: usize,
    pub total: usize,
    /// `processed / total`, 1.0 for an empty batch.
    pub fraction: f64,
    /// File just processed.
    pub current: PathBuf,
}

impl SyncProgress {
    fn new(processed: usize, total: usize, current: PathBuf) -> Self {
        let fraction = if total == 0 {
            1.0
        } else {
            processed as f64 / total as f64
        };
        Self {
            processed,
            total,
            fraction,
            current,
        }
    }
}

/// Aggregate outcome of a sync.
///
/// `written`, `partially_duplicated` and `duplicated` count files by
/// [`DuplicationOutcome`] (`Clean`, `PartialDuplicate`, `FullDuplicate`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    pub written: usize,
    pub partially_duplicated: usize,
    pub duplicated: usize,
    pub defective: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Rows inserted across the batch.
    pub inserted_rows: RowCounts,
    /// Rows discarded as duplicates across the batch.
    pub duplicate_rows: RowCounts,
    /// Rows the parser skipped across the batch.
    pub skipped_rows: usize,
    pub files: Vec<FileResult>,
}

impl SyncResult {
    /// Whether the batch ran to the end without any failed file.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0
    }

    fn record(&mut self, result: FileResult) {
        self.skipped_rows += result.skipped_rows;
        match &result.status {
            FileStatus::Written { report } => {
                match report.outcome {
                    DuplicationOutcome::Clean => self.written += 1,
                    DuplicationOutcome::PartialDuplicate => self.partially_duplicated += 1,
                    DuplicationOutcome::FullDuplicate => self.duplicated += 1,
                }
                self.inserted_rows += report.inserted;
                self.duplicate_rows += report.duplicates;
            }
            FileStatus::Defective { .. } => self.defective += 1,
            FileStatus::Failed { .. } => self.failed += 1,
        }
        self.files.push(result);
    }
}

struct Inner<S> {
    store: Mutex<S>,
    checkpoints: CheckpointStore,
    pipeline: Pipeline,
    scan_options: ScanOptions,
    busy: Arc<AtomicBool>,
    state: Mutex<EngineState>,
}

impl<S: RecordStore> Inner<S> {
    fn set_state(&self, state: EngineState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn checkpoint_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Checkpoint {
            path: self.checkpoints.path().to_path_buf(),
            source,
        }
    }

    fn ingest(&self, path: &Path) -> std::result::Result<FileResult, IngestError> {
        // A panic in an earlier file leaves no partial transaction behind.
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        self.pipeline.ingest(path, &mut *store)
    }

    fn run_scan(
        &self,
        root: &Path,
        watermark: Watermark,
        cancel: &CancellationToken,
    ) -> Result<ScanResult> {
        let started = OffsetDateTime::now_utc();
        let since = match watermark {
            Watermark::All => None,
            Watermark::Since(at) => Some(at),
            Watermark::LastScan => self
                .checkpoints
                .load()
                .map_err(|e| self.checkpoint_error(e))?
                .last_scan,
            Watermark::LastSync => self
                .checkpoints
                .load()
                .map_err(|e| self.checkpoint_error(e))?
                .last_sync,
        };

        let options = ScanOptions {
            since,
            ..self.scan_options.clone()
        };
        match scan_archive(root, &options, cancel)? {
            ScanOutcome::Cancelled => {
                self.set_state(EngineState::Cancelled);
                Ok(ScanResult {
                    files: Vec::new(),
                    cancelled: true,
                })
            }
            ScanOutcome::Complete(files) => {
                self.checkpoints
                    .save_last_scan(started)
                    .map_err(|e| self.checkpoint_error(e))?;
                self.set_state(EngineState::ScanComplete);
                Ok(ScanResult {
                    files,
                    cancelled: false,
                })
            }
        }
    }

    fn run_sync<F>(
        &self,
        files: &[IngestFile],
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<SyncResult>
    where
        F: FnMut(SyncProgress),
    {
        let started = OffsetDateTime::now_utc();
        let total = files.len();
        let mut result = SyncResult::default();
        info!("Syncing {} files", total);

        for (i, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Sync cancelled after {} of {} files", i, total);
                result.cancelled = true;
                break;
            }

            let outcome = match self.ingest(&file.path) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{}", e);
                    FileResult::failed(&file.path, &e)
                }
            };
            result.record(outcome);
            progress(SyncProgress::new(i + 1, total, file.path.clone()));
        }

        if result.cancelled {
            self.set_state(EngineState::Cancelled);
            return Ok(result);
        }

        if result.failed == 0 {
            self.checkpoints
                .save_last_sync(started)
                .map_err(|e| self.checkpoint_error(e))?;
        } else {
            warn!(
                "{} files failed, last sync date not advanced",
                result.failed
            );
        }
        info!(
            "Sync finished: {} written, {} partial, {} duplicate, {} defective, {} failed",
            result.written,
            result.partially_duplicated,
            result.duplicated,
            result.defective,
            result.failed
        );
        self.set_state(EngineState::SyncComplete);
        Ok(result)
    }
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder<S> {
    store: S,
    checkpoints: CheckpointStore,
    pipeline: Pipeline,
    scan_options: ScanOptions,
}

impl<S: RecordStore> SyncEngineBuilder<S> {
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Scan settings; `since` is replaced by the watermark of each scan.
    pub fn scan_options(mut self, options: ScanOptions) -> Self {
        self.scan_options = options;
        self
    }

    pub fn build(self) -> SyncEngine<S> {
        SyncEngine {
            inner: Arc::new(Inner {
                store: Mutex::new(self.store),
                checkpoints: self.checkpoints,
                pipeline: self.pipeline,
                scan_options: self.scan_options,
                busy: Arc::new(AtomicBool::new(false)),
                state: Mutex::new(EngineState::Idle),
            }),
        }
    }
}

/// Scan/sync engine over a record store.
///
/// Cloning is cheap; clones share the store, the busy flag and the state.
pub struct SyncEngine<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RecordStore> SyncEngine<S> {
    /// Engine with the default pipeline and scan options.
    pub fn new(store: S, checkpoints: CheckpointStore) -> Self {
        Self::builder(store, checkpoints).build()
    }

    pub fn builder(store: S, checkpoints: CheckpointStore) -> SyncEngineBuilder<S> {
        SyncEngineBuilder {
            store,
            checkpoints,
            pipeline: Pipeline::default(),
            scan_options: ScanOptions::default(),
        }
    }

    /// State of the current or most recent operation.
    pub fn state(&self) -> EngineState {
        self.inner
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(EngineState::Idle)
    }

    /// Whether an operation is running.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.inner.checkpoints
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// Blocks while a file is being written.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut store = self.inner.store.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut store)
    }

    fn acquire(&self, state: EngineState) -> Result<BusyGuard> {
        let guard = BusyGuard::try_acquire(&self.inner.busy).ok_or(SyncError::Busy)?;
        self.inner.set_state(state);
        Ok(guard)
    }

    /// Collect bench files under `root` newer than `watermark`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Busy`] if another operation is running
    /// - [`SyncError::ArchiveRoot`] if `root` is missing or not a directory
    /// - [`SyncError::Checkpoint`] if the sidecar cannot be read or written
    pub async fn scan(
        &self,
        root: impl Into<PathBuf>,
        watermark: Watermark,
        cancel: CancellationToken,
    ) -> Result<ScanResult> {
        let guard = self.acquire(EngineState::Scanning)?;
        let inner = Arc::clone(&self.inner);
        let root = root.into();

        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = inner.run_scan(&root, watermark, &cancel);
            if result.is_err() {
                inner.set_state(EngineState::Idle);
            }
            result
        })
        .await?;
        result
    }

    /// Ingest `files` in order.
    ///
    /// Per-file failures are recorded in the result and never abort the
    /// batch. `progress` is called on the worker thread after each file.
    pub async fn sync<F>(
        &self,
        files: Vec<IngestFile>,
        cancel: CancellationToken,
        progress: F,
    ) -> Result<SyncResult>
    where
        F: FnMut(SyncProgress) + Send + 'static,
    {
        let guard = self.acquire(EngineState::Syncing)?;
        let inner = Arc::clone(&self.inner);

        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = inner.run_sync(&files, &cancel, progress);
            if result.is_err() {
                inner.set_state(EngineState::Idle);
            }
            result
        })
        .await?;
        result
    }

    /// Ingest one file outside of a batch. Checkpoints are not touched.
    ///
    /// # Errors
    ///
    /// [`SyncError::Ingest`] if the file could not be ingested. Defective
    /// and duplicate files are successful results.
    pub async fn process_single_file(&self, path: impl Into<PathBuf>) -> Result<FileResult> {
        let guard = self.acquire(EngineState::Syncing)?;
        let inner = Arc::clone(&self.inner);
        let path = path.into();

        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = inner.ingest(&path);
            inner.set_state(EngineState::Idle);
            result
        })
        .await?;
        Ok(result?)
    }
}

//! Ingestion and synchronization engine for calibration bench archives.
//!
//! This crate turns the text files written by characterisation and
//! verification benches into stored records.
//!
//! # Features
//!
//! - **Parsing**: header, readings and coefficient blocks, with per-file
//!   deduplicated warnings for malformed rows
//! - **Defect classification**: per-family voltage/resistance envelopes,
//!   date spread and loop current checks, with quarantine of rejects
//! - **Archive scanning**: recursive walk filtered by name and watermark
//! - **Batch sync**: sequential ingest on a blocking worker with progress,
//!   cancellation and a busy guard
//! - **Checkpoints**: `last_scan`/`last_sync` sidecar next to the database
//!
//! # Pipeline
//!
//! | Step | Module | Failure |
//! |------|--------|---------|
//! | Scan | [`scan`] | [`SyncError::ArchiveRoot`] for the whole scan |
//! | Parse | [`parser`] | [`IngestError::Parse`] for the file |
//! | Classify | [`thresholds`] | file moved by [`quarantine`] |
//! | Write | [`RecordStore`] | [`IngestError::Persistence`] for the file |
//!
//! # Quick Start
//!
//! ```no_run
//! use calbench_core::{CheckpointStore, SyncEngine, Watermark};
//! use calbench_store::Store;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = calbench_store::default_db_path();
//!     let engine = SyncEngine::new(Store::open(&db)?, CheckpointStore::beside_database(&db));
//!
//!     let scan = engine
//!         .scan("/srv/bench", Watermark::LastSync, CancellationToken::new())
//!         .await?;
//!     let result = engine.sync(scan.files, CancellationToken::new(), |_| {}).await?;
//!     println!("{} files written", result.written);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod events;
pub mod guard;
pub mod ingest;
pub mod mock;
pub mod parser;
pub mod quarantine;
pub mod scan;
pub mod sync;
pub mod thresholds;
pub mod traits;

pub use checkpoint::{CHECKPOINT_FILE_NAME, Checkpoint, CheckpointStore};
pub use error::{IngestError, Result, SyncError};
pub use events::{
    ChannelSink, EventReceiver, EventSender, EventSink, IngestEvent, MemorySink, Severity,
    TracingSink,
};
pub use guard::BusyGuard;
pub use ingest::{FileResult, FileStatus, Pipeline};
pub use mock::{MockStore, MockStoreError};
pub use parser::{ParserOptions, parse, parse_str};
pub use quarantine::{DEFECT_DIR_NAME, Quarantine};
pub use scan::{IngestFile, ScanOptions, ScanOutcome, TimeSource, scan_archive};
pub use sync::{
    EngineState, ScanResult, SyncEngine, SyncEngineBuilder, SyncProgress, SyncResult, Watermark,
};
pub use thresholds::{Classification, DefectReason, FamilyBounds, Range, ThresholdConfig, Thresholds};
pub use traits::RecordStore;

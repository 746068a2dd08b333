//! Record store for calibration bench data.
//!
//! This crate provides SQLite-based storage for sensors and the
//! characterisation, coefficient and verification rows ingested from
//! bench files.
//!
//! # Features
//!
//! - One row per sensor, keyed by serial number, type and model
//! - Duplicate-aware transactional writes of parsed files
//! - Query by sensor, time range, with pagination
//! - Coefficient sets grouped by effective date
//! - Row deletion with flag maintenance and empty-sensor removal
//!
//! # Example
//!
//! ```no_run
//! use calbench_store::{Store, ReadingQuery};
//!
//! let store = Store::open_default()?;
//!
//! for sensor in store.find_sensors_by_serial("40512")? {
//!     let rows = store.query_characterisation(&ReadingQuery::new().sensor(sensor.id))?;
//!     println!("{} {}: {} rows", sensor.sensor_type, sensor.model, rows.len());
//! }
//! # Ok::<(), calbench_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;
mod writer;

pub use error::{Error, Result};
pub use models::{
    CoefficientSet, StoreStats, StoredCharacterisation, StoredCoefficient, StoredSensor,
    StoredVerification,
};
pub use queries::{ReadingQuery, SensorQuery};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/calbench/calbench.db`
/// - macOS: `~/Library/Application Support/calbench/calbench.db`
/// - Windows: `C:\Users\<user>\AppData\Local\calbench\calbench.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("calbench")
        .join("calbench.db")
}

//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, PrimitiveDateTime};

use calbench_types::DataKind;

/// A sensor stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSensor {
    /// Database row ID.
    pub id: i64,
    /// Bench channel the sensor was first seen on.
    pub channel: Option<i64>,
    /// Serial number.
    pub serial_number: String,
    /// Canonical sensor type.
    pub sensor_type: String,
    /// Model code.
    pub model: String,
    /// Whether characterisation rows exist.
    pub has_characterisation: bool,
    /// Whether coefficient rows exist.
    pub has_coefficients: bool,
    /// Whether verification rows exist.
    pub has_verification: bool,
    /// When the sensor row was created.
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
}

impl StoredSensor {
    /// Whether data of the given class is attached.
    pub fn has(&self, kind: DataKind) -> bool {
        match kind {
            DataKind::Characterisation => self.has_characterisation,
            DataKind::Coefficients => self.has_coefficients,
            DataKind::Verification => self.has_verification,
        }
    }
}

/// A characterisation row stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCharacterisation {
    pub id: i64,
    pub sensor_id: i64,
    pub timestamp: PrimitiveDateTime,
    pub temperature: f64,
    pub range: i64,
    pub pressure: f64,
    pub voltage: f64,
    pub resistance: f64,
    pub deviation: f64,
}

/// A verification row stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVerification {
    pub id: i64,
    pub sensor_id: i64,
    pub timestamp: PrimitiveDateTime,
    pub temperature: f64,
    pub npi: f64,
    pub vpi: f64,
    pub pressure_given: f64,
    pub pressure_real: f64,
    pub current_given: f64,
    pub current_real: f64,
    pub voltage: f64,
    pub resistance: f64,
}

/// A coefficient row stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCoefficient {
    pub id: i64,
    pub sensor_id: i64,
    pub index: i64,
    pub value: f64,
    pub effective_date: PrimitiveDateTime,
}

/// Coefficients sharing one effective date, ordered by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    /// Effective date shared by every entry.
    pub effective_date: PrimitiveDateTime,
    /// Entries ordered by index.
    pub entries: Vec<StoredCoefficient>,
}

/// Row counts across the whole database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub sensors: u64,
    pub characterisation: u64,
    pub coefficients: u64,
    pub verification: u64,
}

/// Bench times are naive; they are stored as Unix seconds read as UTC.
pub(crate) fn to_unix(dt: PrimitiveDateTime) -> i64 {
    dt.assume_utc().unix_timestamp()
}

pub(crate) fn naive_from_sql(idx: usize, ts: i64) -> rusqlite::Result<PrimitiveDateTime> {
    let utc = utc_from_sql(idx, ts)?;
    Ok(PrimitiveDateTime::new(utc.date(), utc.time()))
}

pub(crate) fn utc_from_sql(idx: usize, ts: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ts).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

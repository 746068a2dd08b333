//! In-memory record store for testing.
//!
//! [`MockStore`] implements [`RecordStore`] with the same row identity rules
//! as the SQLite store, so duplicate detection can be exercised without a
//! database.
//!
//! # Features
//!
//! - **Failure injection**: fail every write, the next N writes, or writes
//!   for specific serial numbers
//! - **Latency simulation**: sleep inside each write to keep a batch busy

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use thiserror::Error;
use time::PrimitiveDateTime;

use calbench_types::{DataKind, DuplicationOutcome, ParsedBody, ParsedFile, RowCounts, WriteReport};

use crate::traits::RecordStore;

/// Error returned by a [`MockStore`] with failure injection enabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Mock store failure: {0}")]
pub struct MockStoreError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Reading(i64, DataKind, PrimitiveDateTime),
    Coefficient(i64, i64, u64, PrimitiveDateTime),
}

/// A mock record store for testing.
///
/// # Example
///
/// ```
/// use calbench_core::MockStore;
///
/// let mut store = MockStore::new();
/// store.fail_on_serial("40512");
/// assert_eq!(store.write_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    sensors: HashMap<(String, String, String), i64>,
    rows: HashSet<RowKey>,
    write_count: u32,
    should_fail: bool,
    remaining_failures: u32,
    fail_serials: HashSet<String>,
    latency: Duration,
}

impl MockStore {
    /// Create an empty store that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` inside every write.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every write fail.
    pub fn set_should_fail(&mut self, fail: bool) {
        self.should_fail = fail;
    }

    /// Fail the next `count` writes, then succeed.
    pub fn set_fail_count(&mut self, count: u32) {
        self.remaining_failures = count;
    }

    /// Fail writes for files with this serial number.
    pub fn fail_on_serial(&mut self, serial: &str) {
        self.fail_serials.insert(serial.to_string());
    }

    /// Number of write attempts, failed ones included.
    pub fn write_count(&self) -> u32 {
        self.write_count
    }

    /// Number of distinct sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Number of stored rows of every class.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn check_failure(&mut self, file: &ParsedFile) -> Result<(), MockStoreError> {
        if self.should_fail {
            return Err(MockStoreError("writes disabled".to_string()));
        }
        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            return Err(MockStoreError("injected failure".to_string()));
        }
        if self.fail_serials.contains(&file.header.serial_number) {
            return Err(MockStoreError(format!(
                "rejected serial {}",
                file.header.serial_number
            )));
        }
        Ok(())
    }
}

impl RecordStore for MockStore {
    type Error = MockStoreError;

    fn write_parsed(&mut self, file: &ParsedFile) -> Result<WriteReport, Self::Error> {
        self.write_count += 1;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.check_failure(file)?;

        let identity = (
            file.header.serial_number.clone(),
            file.header.sensor_type.clone(),
            file.header.model.clone(),
        );
        let next_id = self.sensors.len() as i64 + 1;
        let sensor_id = *self.sensors.entry(identity).or_insert(next_id);

        let keys: Vec<(DataKind, RowKey)> = match &file.body {
            ParsedBody::Characterisation {
                readings,
                coefficients,
            } => readings
                .iter()
                .map(|r| {
                    (
                        DataKind::Characterisation,
                        RowKey::Reading(sensor_id, DataKind::Characterisation, r.timestamp),
                    )
                })
                .chain(coefficients.iter().map(|c| {
                    (
                        DataKind::Coefficients,
                        RowKey::Coefficient(sensor_id, c.index, c.value.to_bits(), c.effective_date),
                    )
                }))
                .collect(),
            ParsedBody::Verification { readings } => readings
                .iter()
                .map(|r| {
                    (
                        DataKind::Verification,
                        RowKey::Reading(sensor_id, DataKind::Verification, r.timestamp),
                    )
                })
                .collect(),
        };

        let mut inserted = RowCounts::default();
        let mut duplicates = RowCounts::default();
        for (kind, key) in keys {
            if self.rows.insert(key) {
                inserted.add(kind, 1);
            } else {
                duplicates.add(kind, 1);
            }
        }

        Ok(WriteReport {
            sensor_id,
            outcome: DuplicationOutcome::from_counts(inserted.total(), duplicates.total()),
            inserted,
            duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calbench_types::{
        CharacterisationReading, CoefficientEntry, FileKind, MissingFields, ModelFamily,
        ParseReport, SensorHeader,
    };
    use time::macros::datetime;

    fn file(serial: &str, hours: &[u8]) -> ParsedFile {
        let readings: Vec<_> = hours
            .iter()
            .map(|h| CharacterisationReading {
                timestamp: datetime!(2024-03-01 0:00) + time::Duration::hours(*h as i64),
                temperature: 20.0,
                range: 1,
                pressure: 0.0,
                voltage: 10.0,
                resistance: 5000.0,
                deviation: 0.0,
                missing: MissingFields::default(),
            })
            .collect();
        let coefficients = vec![CoefficientEntry {
            index: 0,
            value: 1.5,
            effective_date: datetime!(2024-03-01 0:00),
        }];
        ParsedFile {
            kind: FileKind::Characterisation,
            header: SensorHeader {
                banner: String::new(),
                channel: None,
                serial_number: serial.to_string(),
                sensor_type: "ЭнИ-100".to_string(),
                model: "ДИ".to_string(),
                family: ModelFamily::EnI100,
            },
            body: ParsedBody::Characterisation {
                readings,
                coefficients,
            },
            report: ParseReport::default(),
        }
    }

    #[test]
    fn test_duplicate_detection() {
        let mut store = MockStore::new();
        let first = store.write_parsed(&file("1", &[0, 1])).unwrap();
        assert_eq!(first.outcome, DuplicationOutcome::Clean);
        assert_eq!(first.inserted.total(), 3);

        let again = store.write_parsed(&file("1", &[0, 1])).unwrap();
        assert_eq!(again.outcome, DuplicationOutcome::FullDuplicate);

        let more = store.write_parsed(&file("1", &[1, 2])).unwrap();
        assert_eq!(more.outcome, DuplicationOutcome::PartialDuplicate);
        assert_eq!(more.inserted.characterisation, 1);
        assert_eq!(store.row_count(), 4);
        assert_eq!(store.sensor_count(), 1);
    }

    #[test]
    fn test_fail_count() {
        let mut store = MockStore::new();
        store.set_fail_count(1);
        assert!(store.write_parsed(&file("1", &[0])).is_err());
        assert!(store.write_parsed(&file("1", &[0])).is_ok());
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_fail_on_serial() {
        let mut store = MockStore::new();
        store.fail_on_serial("bad");
        assert!(store.write_parsed(&file("bad", &[0])).is_err());
        assert!(store.write_parsed(&file("good", &[0])).is_ok());
        assert_eq!(store.row_count(), 2);
    }

    #[test]
    fn test_should_fail() {
        let mut store = MockStore::new();
        store.set_should_fail(true);
        let err = store.write_parsed(&file("1", &[0])).unwrap_err();
        assert_eq!(err.to_string(), "Mock store failure: writes disabled");
    }
}

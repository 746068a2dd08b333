//! Duplicate-aware transactional writer.
//!
//! One parsed file is committed in a single `IMMEDIATE` transaction:
//! the sensor identity is resolved (or created), every candidate row is
//! inserted unless its identity key already exists, and the sensor's
//! `has_*` flags are raised for the classes that received rows.
//!
//! Identity keys are enforced by UNIQUE indexes, so the existence check and
//! the insert are one `INSERT OR IGNORE` statement. A row that is ignored is
//! a duplicate, whether it pre-existed in the store or repeats an earlier row
//! of the same file. The `has_*` flags are therefore never read here; a new
//! sensor goes through the same statement and simply sees no conflicts.

use rusqlite::{OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info};

use calbench_types::{
    CharacterisationReading, CoefficientEntry, DataKind, DuplicationOutcome, ParsedBody,
    ParsedFile, RowCounts, SensorHeader, VerificationReading, WriteReport,
};

use crate::error::Result;
use crate::models::to_unix;
use crate::store::{Store, now_unix};

impl Store {
    /// Commit a parsed file.
    ///
    /// Any failure rolls the whole file back; no partial writes survive.
    pub fn write_parsed(&mut self, file: &ParsedFile) -> Result<WriteReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sensor_id = resolve_sensor(&tx, &file.header)?;
        let mut inserted = RowCounts::default();
        let mut duplicates = RowCounts::default();

        match &file.body {
            ParsedBody::Characterisation {
                readings,
                coefficients,
            } => {
                let (new, dup) = insert_characterisation(&tx, sensor_id, readings)?;
                inserted.add(DataKind::Characterisation, new);
                duplicates.add(DataKind::Characterisation, dup);

                if !coefficients.is_empty() {
                    let (new, dup) = insert_coefficients(&tx, sensor_id, coefficients)?;
                    inserted.add(DataKind::Coefficients, new);
                    duplicates.add(DataKind::Coefficients, dup);
                }
            }
            ParsedBody::Verification { readings } => {
                let (new, dup) = insert_verification(&tx, sensor_id, readings)?;
                inserted.add(DataKind::Verification, new);
                duplicates.add(DataKind::Verification, dup);
            }
        }

        tx.execute(
            "UPDATE sensors SET
                has_characterisation = has_characterisation OR ?2,
                has_coefficients = has_coefficients OR ?3,
                has_verification = has_verification OR ?4
             WHERE id = ?1",
            rusqlite::params![
                sensor_id,
                inserted.characterisation > 0,
                inserted.coefficients > 0,
                inserted.verification > 0,
            ],
        )?;

        tx.commit()?;

        let outcome = DuplicationOutcome::from_counts(inserted.total(), duplicates.total());
        info!(
            "Wrote {} rows for sensor {} ({} duplicates, {})",
            inserted.total(),
            file.header.serial_number,
            duplicates.total(),
            outcome
        );

        Ok(WriteReport {
            sensor_id,
            outcome,
            inserted,
            duplicates,
        })
    }
}

/// Read-then-insert under the caller's transaction.
fn resolve_sensor(tx: &Transaction<'_>, header: &SensorHeader) -> Result<i64> {
    let existing = tx
        .query_row(
            "SELECT id FROM sensors
             WHERE serial_number = ?1 AND sensor_type = ?2 AND model = ?3",
            rusqlite::params![header.serial_number, header.sensor_type, header.model],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute(
        "INSERT INTO sensors (channel, serial_number, sensor_type, model, first_seen)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            header.channel,
            header.serial_number,
            header.sensor_type,
            header.model,
            now_unix()
        ],
    )?;
    let id = tx.last_insert_rowid();
    debug!(
        "Created sensor {} for {} {} {}",
        id, header.serial_number, header.sensor_type, header.model
    );

    Ok(id)
}

fn insert_characterisation(
    tx: &Transaction<'_>,
    sensor_id: i64,
    readings: &[CharacterisationReading],
) -> Result<(usize, usize)> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO characterisation
         (sensor_id, timestamp, temperature, range_index, pressure, voltage, resistance, deviation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut inserted = 0;
    for r in readings {
        inserted += stmt.execute(rusqlite::params![
            sensor_id,
            to_unix(r.timestamp),
            r.temperature,
            r.range,
            r.pressure,
            r.voltage,
            r.resistance,
            r.deviation,
        ])?;
    }
    Ok((inserted, readings.len() - inserted))
}

fn insert_coefficients(
    tx: &Transaction<'_>,
    sensor_id: i64,
    coefficients: &[CoefficientEntry],
) -> Result<(usize, usize)> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO coefficients (sensor_id, idx, value, effective_date)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut inserted = 0;
    for c in coefficients {
        inserted += stmt.execute(rusqlite::params![
            sensor_id,
            c.index,
            c.value,
            to_unix(c.effective_date),
        ])?;
    }
    Ok((inserted, coefficients.len() - inserted))
}

fn insert_verification(
    tx: &Transaction<'_>,
    sensor_id: i64,
    readings: &[VerificationReading],
) -> Result<(usize, usize)> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO verification
         (sensor_id, timestamp, temperature, npi, vpi, pressure_given, pressure_real,
          current_given, current_real, voltage, resistance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut inserted = 0;
    for r in readings {
        inserted += stmt.execute(rusqlite::params![
            sensor_id,
            to_unix(r.timestamp),
            r.temperature,
            r.npi,
            r.vpi,
            r.pressure_given,
            r.pressure_real,
            r.current_given,
            r.current_real,
            r.voltage,
            r.resistance,
        ])?;
    }
    Ok((inserted, readings.len() - inserted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadingQuery;
    use crate::test_support::{characterisation_file, verification_file};

    #[test]
    fn test_first_write_is_clean() {
        let mut store = Store::open_in_memory().unwrap();
        let report = store
            .write_parsed(&characterisation_file("100", "ДИ", 4, 3))
            .unwrap();

        assert_eq!(report.outcome, DuplicationOutcome::Clean);
        assert_eq!(report.inserted.characterisation, 4);
        assert_eq!(report.inserted.coefficients, 3);
        assert_eq!(report.duplicates.total(), 0);

        let sensor = store.get_sensor(report.sensor_id).unwrap().unwrap();
        assert!(sensor.has_characterisation);
        assert!(sensor.has_coefficients);
        assert!(!sensor.has_verification);
        assert_eq!(sensor.channel, Some(2));
    }

    #[test]
    fn test_same_file_twice_is_full_duplicate() {
        let mut store = Store::open_in_memory().unwrap();
        let file = characterisation_file("101", "ДИ", 4, 3);
        store.write_parsed(&file).unwrap();

        let second = store.write_parsed(&file).unwrap();
        assert_eq!(second.outcome, DuplicationOutcome::FullDuplicate);
        assert_eq!(second.inserted.total(), 0);
        assert_eq!(second.duplicates.characterisation, 4);
        assert_eq!(second.duplicates.coefficients, 3);
        assert_eq!(store.stats().unwrap().characterisation, 4);
    }

    #[test]
    fn test_half_known_file_is_partial_duplicate() {
        let mut store = Store::open_in_memory().unwrap();
        let full = characterisation_file("102", "ДИ", 6, 0);
        let mut first_half = full.clone();
        if let ParsedBody::Characterisation { readings, .. } = &mut first_half.body {
            readings.truncate(3);
        }
        store.write_parsed(&first_half).unwrap();

        let report = store.write_parsed(&full).unwrap();
        assert_eq!(report.outcome, DuplicationOutcome::PartialDuplicate);
        assert_eq!(report.inserted.characterisation, 3);
        assert_eq!(report.duplicates.characterisation, 3);

        let rows = store
            .query_characterisation(&ReadingQuery::new().sensor(report.sensor_id))
            .unwrap();
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_repeated_row_within_file_counts_as_duplicate() {
        let mut store = Store::open_in_memory().unwrap();
        let mut file = verification_file("103", &[12.0, 12.0]);
        if let ParsedBody::Verification { readings } = &mut file.body {
            readings[1].timestamp = readings[0].timestamp;
        }
        let report = store.write_parsed(&file).unwrap();
        assert_eq!(report.inserted.verification, 1);
        assert_eq!(report.duplicates.verification, 1);
        assert_eq!(report.outcome, DuplicationOutcome::PartialDuplicate);
    }

    #[test]
    fn test_same_serial_different_model_is_new_sensor() {
        let mut store = Store::open_in_memory().unwrap();
        let a = store
            .write_parsed(&characterisation_file("104", "ДИ", 2, 0))
            .unwrap();
        let b = store
            .write_parsed(&characterisation_file("104", "ДА", 2, 0))
            .unwrap();
        assert_ne!(a.sensor_id, b.sensor_id);
        assert_eq!(b.outcome, DuplicationOutcome::Clean);
    }

    #[test]
    fn test_verification_after_characterisation_sets_flag() {
        let mut store = Store::open_in_memory().unwrap();
        let ch = store
            .write_parsed(&characterisation_file("105", "ДИ", 2, 0))
            .unwrap();
        let vr = store
            .write_parsed(&verification_file("105", &[12.0]))
            .unwrap();
        assert_eq!(ch.sensor_id, vr.sensor_id);
        assert_eq!(vr.outcome, DuplicationOutcome::Clean);

        let sensor = store.get_sensor(ch.sensor_id).unwrap().unwrap();
        assert!(sensor.has_characterisation && sensor.has_verification);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_coefficients BEFORE INSERT ON coefficients
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store.write_parsed(&characterisation_file("106", "ДИ", 3, 2));
        assert!(result.is_err());

        let stats = store.stats().unwrap();
        assert_eq!(stats.sensors, 0);
        assert_eq!(stats.characterisation, 0);
    }
}

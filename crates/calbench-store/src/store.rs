//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params_from_iter};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::{debug, info};

use calbench_types::DataKind;

use crate::error::{Error, Result};
use crate::models::{
    CoefficientSet, StoreStats, StoredCharacterisation, StoredCoefficient, StoredSensor,
    StoredVerification, naive_from_sql, to_unix, utc_from_sql,
};
use crate::queries::{ReadingQuery, SensorQuery};
use crate::schema;

pub(crate) const SENSOR_COLUMNS: &str = "id, channel, serial_number, sensor_type, model, \
     has_characterisation, has_coefficients, has_verification, first_seen";

const CHARACTERISATION_COLUMNS: &str =
    "id, sensor_id, timestamp, temperature, range_index, pressure, voltage, resistance, deviation";

const VERIFICATION_COLUMNS: &str = "id, sensor_id, timestamp, temperature, npi, vpi, \
     pressure_given, pressure_real, current_given, current_real, voltage, resistance";

/// SQLite-based store for calibration bench data.
#[derive(Debug)]
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

pub(crate) fn sensor_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSensor> {
    Ok(StoredSensor {
        id: row.get(0)?,
        channel: row.get(1)?,
        serial_number: row.get(2)?,
        sensor_type: row.get(3)?,
        model: row.get(4)?,
        has_characterisation: row.get(5)?,
        has_coefficients: row.get(6)?,
        has_verification: row.get(7)?,
        first_seen: utc_from_sql(8, row.get(8)?)?,
    })
}

fn characterisation_from_row(row: &Row<'_>) -> rusqlite::Result<StoredCharacterisation> {
    Ok(StoredCharacterisation {
        id: row.get(0)?,
        sensor_id: row.get(1)?,
        timestamp: naive_from_sql(2, row.get(2)?)?,
        temperature: row.get(3)?,
        range: row.get(4)?,
        pressure: row.get(5)?,
        voltage: row.get(6)?,
        resistance: row.get(7)?,
        deviation: row.get(8)?,
    })
}

fn verification_from_row(row: &Row<'_>) -> rusqlite::Result<StoredVerification> {
    Ok(StoredVerification {
        id: row.get(0)?,
        sensor_id: row.get(1)?,
        timestamp: naive_from_sql(2, row.get(2)?)?,
        temperature: row.get(3)?,
        npi: row.get(4)?,
        vpi: row.get(5)?,
        pressure_given: row.get(6)?,
        pressure_real: row.get(7)?,
        current_given: row.get(8)?,
        current_real: row.get(9)?,
        voltage: row.get(10)?,
        resistance: row.get(11)?,
    })
}

fn table_for(kind: DataKind) -> &'static str {
    match kind {
        DataKind::Characterisation => "characterisation",
        DataKind::Coefficients => "coefficients",
        DataKind::Verification => "verification",
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// Sensor operations
impl Store {
    /// Get a sensor by ID.
    pub fn get_sensor(&self, sensor_id: i64) -> Result<Option<StoredSensor>> {
        let sql = format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE id = ?");
        let sensor = self
            .conn
            .query_row(&sql, [sensor_id], sensor_from_row)
            .optional()?;
        Ok(sensor)
    }

    /// Look up a sensor by its full identity.
    pub fn find_sensor(
        &self,
        serial_number: &str,
        sensor_type: &str,
        model: &str,
    ) -> Result<Option<StoredSensor>> {
        let sql = format!(
            "SELECT {SENSOR_COLUMNS} FROM sensors
             WHERE serial_number = ?1 AND sensor_type = ?2 AND model = ?3"
        );
        let sensor = self
            .conn
            .query_row(
                &sql,
                rusqlite::params![serial_number, sensor_type, model],
                sensor_from_row,
            )
            .optional()?;
        Ok(sensor)
    }

    /// All type/model variants recorded under a serial number.
    pub fn find_sensors_by_serial(&self, serial_number: &str) -> Result<Vec<StoredSensor>> {
        self.query_sensors(&SensorQuery::new().serial(serial_number))
    }

    /// List all sensors.
    pub fn list_sensors(&self) -> Result<Vec<StoredSensor>> {
        self.query_sensors(&SensorQuery::new())
    }

    /// Query sensors with filters.
    pub fn query_sensors(&self, query: &SensorQuery) -> Result<Vec<StoredSensor>> {
        let (sql, params) = query.build_sql();
        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let sensors = stmt
            .query_map(params_ref.as_slice(), sensor_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sensors)
    }

    /// Serial numbers with characterisation rows in the given month.
    ///
    /// `sensor_type` and `model` narrow the result when given.
    pub fn serials_for_month(
        &self,
        year: i32,
        month: Month,
        sensor_type: Option<&str>,
        model: Option<&str>,
    ) -> Result<Vec<String>> {
        let start = Date::from_calendar_date(year, month, 1)
            .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
        let (next_year, next_month) = match month {
            Month::December => (year + 1, Month::January),
            m => (year, m.next()),
        };
        let end = Date::from_calendar_date(next_year, next_month, 1)
            .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT s.serial_number FROM sensors s
             JOIN characterisation c ON c.sensor_id = s.id
             WHERE c.timestamp >= ?1 AND c.timestamp < ?2
               AND (?3 IS NULL OR s.sensor_type = ?3)
               AND (?4 IS NULL OR s.model = ?4)
             ORDER BY s.serial_number",
        )?;
        let serials = stmt
            .query_map(
                rusqlite::params![
                    to_unix(PrimitiveDateTime::new(start, Time::MIDNIGHT)),
                    to_unix(PrimitiveDateTime::new(end, Time::MIDNIGHT)),
                    sensor_type,
                    model
                ],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(serials)
    }
}

// Reading operations
impl Store {
    /// Query characterisation rows with filters.
    pub fn query_characterisation(
        &self,
        query: &ReadingQuery,
    ) -> Result<Vec<StoredCharacterisation>> {
        let sql = query.build_sql("characterisation", CHARACTERISATION_COLUMNS);
        let (_, params) = query.build_where();
        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), characterisation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Query verification rows with filters.
    pub fn query_verification(&self, query: &ReadingQuery) -> Result<Vec<StoredVerification>> {
        let sql = query.build_sql("verification", VERIFICATION_COLUMNS);
        let (_, params) = query.build_where();
        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), verification_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Coefficients of a sensor grouped by effective date, oldest set first.
    pub fn coefficients_by_date(&self, sensor_id: i64) -> Result<Vec<CoefficientSet>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sensor_id, idx, value, effective_date FROM coefficients
             WHERE sensor_id = ? ORDER BY effective_date, idx",
        )?;
        let rows = stmt
            .query_map([sensor_id], |row| {
                Ok(StoredCoefficient {
                    id: row.get(0)?,
                    sensor_id: row.get(1)?,
                    index: row.get(2)?,
                    value: row.get(3)?,
                    effective_date: naive_from_sql(4, row.get(4)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut sets: Vec<CoefficientSet> = Vec::new();
        for row in rows {
            match sets.last_mut() {
                Some(set) if set.effective_date == row.effective_date => set.entries.push(row),
                _ => sets.push(CoefficientSet {
                    effective_date: row.effective_date,
                    entries: vec![row],
                }),
            }
        }
        Ok(sets)
    }

    /// Count rows of one class, optionally for one sensor.
    pub fn count_rows(&self, kind: DataKind, sensor_id: Option<i64>) -> Result<u64> {
        let table = table_for(kind);
        let count: i64 = match sensor_id {
            Some(id) => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE sensor_id = ?"),
                [id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?,
        };
        Ok(count as u64)
    }

    /// Row counts across the whole database.
    pub fn stats(&self) -> Result<StoreStats> {
        let sensors: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sensors", [], |row| row.get(0))?;
        Ok(StoreStats {
            sensors: sensors as u64,
            characterisation: self.count_rows(DataKind::Characterisation, None)?,
            coefficients: self.count_rows(DataKind::Coefficients, None)?,
            verification: self.count_rows(DataKind::Verification, None)?,
        })
    }
}

// Deletion operations
impl Store {
    /// Delete characterisation rows by ID. Returns the number removed.
    pub fn delete_characterisation(&mut self, ids: &[i64]) -> Result<usize> {
        self.delete_rows(DataKind::Characterisation, ids)
    }

    /// Delete verification rows by ID. Returns the number removed.
    pub fn delete_verification(&mut self, ids: &[i64]) -> Result<usize> {
        self.delete_rows(DataKind::Verification, ids)
    }

    /// Delete coefficient rows by ID. Returns the number removed.
    pub fn delete_coefficients(&mut self, ids: &[i64]) -> Result<usize> {
        self.delete_rows(DataKind::Coefficients, ids)
    }

    fn delete_rows(&mut self, kind: DataKind, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = table_for(kind);
        let marks = placeholders(ids.len());

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sensor_ids: Vec<i64> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT DISTINCT sensor_id FROM {table} WHERE id IN ({marks})"
            ))?;
            stmt.query_map(params_from_iter(ids.iter()), |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let removed = tx.execute(
            &format!("DELETE FROM {table} WHERE id IN ({marks})"),
            params_from_iter(ids.iter()),
        )?;

        for sensor_id in &sensor_ids {
            refresh_flags(&tx, *sensor_id)?;
        }
        tx.commit()?;

        info!("Deleted {} {} rows", removed, kind);
        Ok(removed)
    }

    /// Delete every row of one class attached to a sensor.
    pub fn clear_sensor_data(&mut self, sensor_id: i64, kind: DataKind) -> Result<usize> {
        let table = table_for(kind);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            &format!("DELETE FROM {table} WHERE sensor_id = ?"),
            [sensor_id],
        )?;
        refresh_flags(&tx, sensor_id)?;
        tx.commit()?;

        info!("Cleared {} {} rows of sensor {}", removed, kind, sensor_id);
        Ok(removed)
    }

    /// Whether any reading or coefficient row references the sensor.
    pub fn has_related_data(&self, sensor_id: i64) -> Result<bool> {
        let related: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM characterisation WHERE sensor_id = ?1)
                 OR EXISTS(SELECT 1 FROM coefficients WHERE sensor_id = ?1)
                 OR EXISTS(SELECT 1 FROM verification WHERE sensor_id = ?1)",
            [sensor_id],
            |row| row.get(0),
        )?;
        Ok(related)
    }

    /// Remove the sensor row when nothing references it any more.
    ///
    /// Returns `true` when the sensor was removed.
    pub fn remove_sensor_if_empty(&mut self, sensor_id: i64) -> Result<bool> {
        if self.get_sensor(sensor_id)?.is_none() {
            return Err(Error::SensorNotFound(sensor_id));
        }
        if self.has_related_data(sensor_id)? {
            debug!("Sensor {} still has data, keeping it", sensor_id);
            return Ok(false);
        }
        self.conn
            .execute("DELETE FROM sensors WHERE id = ?", [sensor_id])?;
        info!("Removed sensor {}", sensor_id);
        Ok(true)
    }
}

/// Recompute the `has_*` flags of a sensor from the rows that remain.
pub(crate) fn refresh_flags(conn: &Connection, sensor_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE sensors SET
            has_characterisation = EXISTS(SELECT 1 FROM characterisation WHERE sensor_id = ?1),
            has_coefficients = EXISTS(SELECT 1 FROM coefficients WHERE sensor_id = ?1),
            has_verification = EXISTS(SELECT 1 FROM verification WHERE sensor_id = ?1)
         WHERE id = ?1",
        [sensor_id],
    )?;
    Ok(())
}

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

//! Query builders for sensors and stored readings.
//!
//! Both [`SensorQuery`] and [`ReadingQuery`] follow the builder pattern.
//!
//! # Example
//!
//! ```
//! use calbench_store::{ReadingQuery, SensorQuery, Store};
//! use time::macros::datetime;
//!
//! let store = Store::open_in_memory()?;
//!
//! let sensors = store.query_sensors(&SensorQuery::new().sensor_type("ЭнИ-100"))?;
//!
//! let query = ReadingQuery::new()
//!     .sensor(1)
//!     .since(datetime!(2024-01-01 0:00))
//!     .oldest_first()
//!     .limit(50);
//! let rows = store.query_characterisation(&query)?;
//! # Ok::<(), calbench_store::Error>(())
//! ```

use time::PrimitiveDateTime;

use calbench_types::DataKind;

use crate::models::to_unix;

/// Fluent query builder for sensors.
///
/// With no filters every sensor is returned, ordered by serial number.
#[derive(Debug, Default, Clone)]
pub struct SensorQuery {
    /// Filter by exact serial number.
    pub serial_number: Option<String>,
    /// Filter by canonical sensor type.
    pub sensor_type: Option<String>,
    /// Filter by model code.
    pub model: Option<String>,
    /// Only sensors with data of this class.
    pub with_data: Option<DataKind>,
}

impl SensorQuery {
    /// Create a query matching every sensor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by serial number.
    pub fn serial(mut self, serial: &str) -> Self {
        self.serial_number = Some(serial.to_string());
        self
    }

    /// Filter by sensor type.
    pub fn sensor_type(mut self, sensor_type: &str) -> Self {
        self.sensor_type = Some(sensor_type.to_string());
        self
    }

    /// Filter by model code.
    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Only sensors that have data of the given class.
    pub fn with_data(mut self, kind: DataKind) -> Self {
        self.with_data = Some(kind);
        self
    }

    pub(crate) fn build_sql(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref serial) = self.serial_number {
            conditions.push("serial_number = ?");
            params.push(Box::new(serial.clone()));
        }
        if let Some(ref sensor_type) = self.sensor_type {
            conditions.push("sensor_type = ?");
            params.push(Box::new(sensor_type.clone()));
        }
        if let Some(ref model) = self.model {
            conditions.push("model = ?");
            params.push(Box::new(model.clone()));
        }
        if let Some(kind) = self.with_data {
            conditions.push(match kind {
                DataKind::Characterisation => "has_characterisation = 1",
                DataKind::Coefficients => "has_coefficients = 1",
                DataKind::Verification => "has_verification = 1",
            });
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM sensors {} ORDER BY serial_number, sensor_type, model",
            crate::store::SENSOR_COLUMNS,
            where_clause
        );
        (sql, params)
    }
}

/// Fluent query builder for characterisation and verification rows.
///
/// By default results are ordered by `timestamp` descending (newest first).
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by sensor ID.
    pub sensor_id: Option<i64>,
    /// Include only rows at or after this time.
    pub since: Option<PrimitiveDateTime>,
    /// Include only rows at or before this time.
    pub until: Option<PrimitiveDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending.
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query with default settings (newest first, no filters).
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by sensor ID.
    pub fn sensor(mut self, sensor_id: i64) -> Self {
        self.sensor_id = Some(sensor_id);
        self
    }

    /// Filter to rows at or after this time.
    pub fn since(mut self, time: PrimitiveDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to rows at or before this time.
    pub fn until(mut self, time: PrimitiveDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results oldest first (chronological).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(sensor_id) = self.sensor_id {
            conditions.push("sensor_id = ?");
            params.push(Box::new(sensor_id));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(to_unix(since)));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to_unix(until)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query against `table`, selecting `columns`.
    pub(crate) fn build_sql(&self, table: &str, columns: &str) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT {} FROM {} {} ORDER BY timestamp {}",
            columns, table, where_clause, order
        );

        // SQLite requires LIMIT before OFFSET
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        sql
    }
}

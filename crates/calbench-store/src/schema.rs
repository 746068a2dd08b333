//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Each reading table carries a UNIQUE constraint on its identity key so
/// that duplicate rows are rejected by `INSERT OR IGNORE`.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- One row per physical sensor
        CREATE TABLE IF NOT EXISTS sensors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel INTEGER,
            serial_number TEXT NOT NULL,
            sensor_type TEXT NOT NULL,
            model TEXT NOT NULL,
            has_characterisation INTEGER NOT NULL DEFAULT 0,
            has_coefficients INTEGER NOT NULL DEFAULT 0,
            has_verification INTEGER NOT NULL DEFAULT 0,
            first_seen INTEGER NOT NULL,
            UNIQUE(serial_number, sensor_type, model)
        );
        CREATE INDEX IF NOT EXISTS idx_sensors_serial ON sensors(serial_number);

        CREATE TABLE IF NOT EXISTS characterisation (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sensor_id INTEGER NOT NULL REFERENCES sensors(id),
            timestamp INTEGER NOT NULL,
            temperature REAL NOT NULL,
            range_index INTEGER NOT NULL,
            pressure REAL NOT NULL,
            voltage REAL NOT NULL,
            resistance REAL NOT NULL,
            deviation REAL NOT NULL,
            UNIQUE(sensor_id, timestamp)
        );

        CREATE TABLE IF NOT EXISTS coefficients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sensor_id INTEGER NOT NULL REFERENCES sensors(id),
            idx INTEGER NOT NULL,
            value REAL NOT NULL,
            effective_date INTEGER NOT NULL,
            UNIQUE(sensor_id, idx, value, effective_date)
        );

        CREATE TABLE IF NOT EXISTS verification (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sensor_id INTEGER NOT NULL REFERENCES sensors(id),
            timestamp INTEGER NOT NULL,
            temperature REAL NOT NULL,
            npi REAL NOT NULL,
            vpi REAL NOT NULL,
            pressure_given REAL NOT NULL,
            pressure_real REAL NOT NULL,
            current_given REAL NOT NULL,
            current_real REAL NOT NULL,
            voltage REAL NOT NULL,
            resistance REAL NOT NULL,
            UNIQUE(sensor_id, timestamp)
        );
        "#,
    )?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    // No migrations yet; future versions branch on old_version here.
    let _ = old_version;
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "sensors",
            "characterisation",
            "coefficients",
            "verification",
            "schema_version",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_schema_version_tracking() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // Re-initializing is a no-op
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_sensor_identity_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let insert = "INSERT INTO sensors (serial_number, sensor_type, model, first_seen)
                      VALUES ('100', 'ЭнИ-100', 'ДИ', 0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}

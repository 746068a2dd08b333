//! Sensors command - list stored sensors.

use anyhow::Result;
use calbench_store::SensorQuery;
use serde::Serialize;
use time::Month;

use super::RunContext;
use crate::cli::OutputFormat;
use crate::format::{format_sensors_text, format_serials_text};
use crate::util::{open_store, write_json, write_output};

/// Arguments for the sensors command.
pub struct SensorsArgs {
    pub serial: Option<String>,
    pub month: Option<(i32, Month)>,
    pub sensor_type: Option<String>,
    pub model: Option<String>,
}

#[derive(Serialize)]
struct MonthSerials {
    year: i32,
    month: u8,
    serials: Vec<String>,
}

/// Execute the sensors command.
pub fn cmd_sensors(args: SensorsArgs, ctx: &RunContext) -> Result<()> {
    let store = open_store(&ctx.db_path)?;

    if let Some((year, month)) = args.month {
        let serials = store.serials_for_month(
            year,
            month,
            args.sensor_type.as_deref(),
            args.model.as_deref(),
        )?;
        return match ctx.format {
            OutputFormat::Json => write_json(&MonthSerials {
                year,
                month: month as u8,
                serials,
            }),
            OutputFormat::Text => write_output(&format_serials_text(
                &serials,
                &format!("{:04}-{:02}", year, month as u8),
                &ctx.opts,
            )),
        };
    }

    let sensors = store.query_sensors(&build_query(&args))?;
    match ctx.format {
        OutputFormat::Json => write_json(&sensors),
        OutputFormat::Text => write_output(&format_sensors_text(&sensors, &ctx.opts)),
    }
}

fn build_query(args: &SensorsArgs) -> SensorQuery {
    let mut query = SensorQuery::new();
    if let Some(serial) = &args.serial {
        query = query.serial(serial);
    }
    if let Some(sensor_type) = &args.sensor_type {
        query = query.sensor_type(sensor_type);
    }
    if let Some(model) = &args.model {
        query = query.model(model);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        let args = SensorsArgs {
            serial: Some("40512".to_string()),
            month: None,
            sensor_type: Some("ЭнИ-100".to_string()),
            model: None,
        };
        let query = build_query(&args);
        assert_eq!(query.serial_number.as_deref(), Some("40512"));
        assert_eq!(query.sensor_type.as_deref(), Some("ЭнИ-100"));
        assert_eq!(query.model, None);
    }
}

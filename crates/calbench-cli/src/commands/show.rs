//! Show command - stored rows and coefficient sets for one sensor.

use anyhow::{Result, bail};
use calbench_store::{ReadingQuery, Store};
use calbench_types::{DataKind, RowCounts};
use serde::Serialize;

use super::RunContext;
use crate::cli::OutputFormat;
use crate::format::{SensorDetail, format_sensor_text};
use crate::util::{open_store, write_json, write_output};

/// Execute the show command.
pub fn cmd_show(sensor_id: i64, limit: u32, ctx: &RunContext) -> Result<()> {
    let store = open_store(&ctx.db_path)?;
    let detail = load_detail(&store, sensor_id, limit)?;

    match ctx.format {
        OutputFormat::Json => write_json(&DetailJson::from(&detail)),
        OutputFormat::Text => write_output(&format_sensor_text(&detail, &ctx.opts)),
    }
}

fn load_detail(store: &Store, sensor_id: i64, limit: u32) -> Result<SensorDetail> {
    let Some(sensor) = store.get_sensor(sensor_id)? else {
        bail!(
            "No sensor with id {}. Run 'calbench sensors' to list stored sensors.",
            sensor_id
        );
    };

    let mut query = ReadingQuery::new().sensor(sensor_id).oldest_first();
    if limit > 0 {
        query = query.limit(limit);
    }

    let mut counts = RowCounts::default();
    for kind in [
        DataKind::Characterisation,
        DataKind::Coefficients,
        DataKind::Verification,
    ] {
        counts.add(kind, store.count_rows(kind, Some(sensor_id))? as usize);
    }

    Ok(SensorDetail {
        characterisation: store.query_characterisation(&query)?,
        verification: store.query_verification(&query)?,
        coefficients: store.coefficients_by_date(sensor_id)?,
        counts,
        sensor,
    })
}

#[derive(Serialize)]
struct DetailJson<'a> {
    sensor: &'a calbench_store::StoredSensor,
    counts: RowCounts,
    characterisation: &'a [calbench_store::StoredCharacterisation],
    coefficients: &'a [calbench_store::CoefficientSet],
    verification: &'a [calbench_store::StoredVerification],
}

impl<'a> From<&'a SensorDetail> for DetailJson<'a> {
    fn from(detail: &'a SensorDetail) -> Self {
        Self {
            sensor: &detail.sensor,
            counts: detail.counts,
            characterisation: &detail.characterisation,
            coefficients: &detail.coefficients,
            verification: &detail.verification,
        }
    }
}

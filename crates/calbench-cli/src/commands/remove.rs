//! Remove command - delete stored data for a sensor.

use anyhow::{Result, bail};
use calbench_store::Store;
use calbench_types::DataKind;
use serde::Serialize;
use tracing::info;

use super::RunContext;
use crate::cli::{KindArg, OutputFormat};
use crate::style;
use crate::util::{confirm, open_store, write_json, write_output};

/// Arguments for the remove command.
pub struct RemoveArgs {
    pub sensor_id: i64,
    pub kinds: Vec<KindArg>,
    pub yes: bool,
}

#[derive(Debug, Default, Serialize)]
struct RemoveReport {
    sensor_id: i64,
    characterisation: usize,
    coefficients: usize,
    verification: usize,
    /// Whether the sensor row itself was deleted.
    sensor_removed: bool,
}

/// Execute the remove command.
pub fn cmd_remove(args: RemoveArgs, ctx: &RunContext) -> Result<()> {
    let mut store = open_store(&ctx.db_path)?;
    let Some(sensor) = store.get_sensor(args.sensor_id)? else {
        bail!("No sensor with id {}", args.sensor_id);
    };

    let kinds = selected_kinds(&args.kinds);
    let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    let prompt = format!(
        "Remove {} data for sensor {} ({} {} {})?",
        names.join(", "),
        sensor.id,
        sensor.serial_number,
        sensor.sensor_type,
        sensor.model
    );
    if !confirm(&prompt, args.yes)? {
        eprintln!("Aborted.");
        return Ok(());
    }

    let report = remove(&mut store, args.sensor_id, &kinds)?;

    match ctx.format {
        OutputFormat::Json => write_json(&report),
        OutputFormat::Text => {
            let mut message = format!(
                "Removed {} characterisation, {} coefficient and {} verification row(s)",
                report.characterisation, report.coefficients, report.verification
            );
            if report.sensor_removed {
                message.push_str(&format!("; sensor {} deleted", report.sensor_id));
            }
            write_output(&format!(
                "{}\n",
                style::format_success(&message, ctx.opts.no_color)
            ))
        }
    }
}

fn selected_kinds(kinds: &[KindArg]) -> Vec<DataKind> {
    if kinds.is_empty() {
        return vec![
            DataKind::Characterisation,
            DataKind::Coefficients,
            DataKind::Verification,
        ];
    }
    let mut selected: Vec<DataKind> = Vec::new();
    for kind in kinds.iter().copied().map(DataKind::from) {
        if !selected.contains(&kind) {
            selected.push(kind);
        }
    }
    selected
}

fn remove(store: &mut Store, sensor_id: i64, kinds: &[DataKind]) -> Result<RemoveReport> {
    let mut report = RemoveReport {
        sensor_id,
        ..Default::default()
    };
    for &kind in kinds {
        let removed = store.clear_sensor_data(sensor_id, kind)?;
        info!("Removed {} {} row(s) for sensor {}", removed, kind, sensor_id);
        match kind {
            DataKind::Characterisation => report.characterisation = removed,
            DataKind::Coefficients => report.coefficients = removed,
            DataKind::Verification => report.verification = removed,
        }
    }
    report.sensor_removed = store.remove_sensor_if_empty(sensor_id)?;
    Ok(report)
}

//! Output formatting for stored records and ingest results.

use calbench_core::{Checkpoint, FileResult, FileStatus, SyncResult};
use calbench_store::{
    CoefficientSet, StoreStats, StoredCharacterisation, StoredSensor, StoredVerification,
};
use calbench_types::RowCounts;
use tabled::builder::Builder;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::style;

/// Formatting options shared by text renderers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub no_color: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }
}

/// Bench-style timestamp (`DD.MM.YYYY hh:mm:ss`).
#[must_use]
pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    let format = format_description!("[day].[month].[year] [hour]:[minute]:[second]");
    ts.format(&format).unwrap_or_else(|_| ts.to_string())
}

#[must_use]
pub fn format_instant(at: Option<OffsetDateTime>) -> String {
    match at {
        Some(at) => at.format(&Rfc3339).unwrap_or_else(|_| at.to_string()),
        None => "never".to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "-" }
}

// ============================================================================
// Sensors
// ============================================================================

#[must_use]
pub fn format_sensors_text(sensors: &[StoredSensor], opts: &FormatOptions) -> String {
    if sensors.is_empty() {
        return "No sensors found. Run 'calbench sync' to ingest an archive.\n".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record([
        "Id", "Serial", "Type", "Model", "Channel", "Char", "Coef", "Verif", "First seen",
    ]);
    for sensor in sensors {
        builder.push_record([
            sensor.id.to_string(),
            sensor.serial_number.clone(),
            sensor.sensor_type.clone(),
            sensor.model.clone(),
            sensor
                .channel
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            yes_no(sensor.has_characterisation).to_string(),
            yes_no(sensor.has_coefficients).to_string(),
            yes_no(sensor.has_verification).to_string(),
            format_instant(Some(sensor.first_seen)),
        ]);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table);
    format!(
        "{}\n{}\n",
        style::format_title(&format!("Sensors ({})", sensors.len()), opts.no_color),
        table
    )
}

#[must_use]
pub fn format_serials_text(serials: &[String], month: &str, opts: &FormatOptions) -> String {
    if serials.is_empty() {
        return format!("No sensors characterised in {}.\n", month);
    }
    let mut output = format!(
        "{}\n",
        style::format_title(
            &format!("Serials characterised in {} ({})", month, serials.len()),
            opts.no_color
        )
    );
    for serial in serials {
        output.push_str(&format!("  {}\n", serial));
    }
    output
}

// ============================================================================
// Sensor detail
// ============================================================================

/// Everything `show` prints for one sensor.
#[derive(Debug)]
pub struct SensorDetail {
    pub sensor: StoredSensor,
    pub counts: RowCounts,
    pub characterisation: Vec<StoredCharacterisation>,
    pub verification: Vec<StoredVerification>,
    pub coefficients: Vec<CoefficientSet>,
}

#[must_use]
pub fn format_sensor_text(detail: &SensorDetail, opts: &FormatOptions) -> String {
    let sensor = &detail.sensor;
    let mut builder = Builder::default();
    builder.push_record(["Property", "Value"]);
    builder.push_record(["Id".to_string(), sensor.id.to_string()]);
    builder.push_record(["Serial".to_string(), sensor.serial_number.clone()]);
    builder.push_record(["Type".to_string(), sensor.sensor_type.clone()]);
    builder.push_record(["Model".to_string(), sensor.model.clone()]);
    builder.push_record([
        "Channel".to_string(),
        sensor
            .channel
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]);
    builder.push_record([
        "First seen".to_string(),
        format_instant(Some(sensor.first_seen)),
    ]);
    builder.push_record([
        "Characterisation rows".to_string(),
        detail.counts.characterisation.to_string(),
    ]);
    builder.push_record([
        "Coefficient rows".to_string(),
        detail.counts.coefficients.to_string(),
    ]);
    builder.push_record([
        "Verification rows".to_string(),
        detail.counts.verification.to_string(),
    ]);
    let mut table = builder.build();
    style::apply_table_style(&mut table);

    let mut output = format!(
        "{}\n{}\n",
        style::format_title("Sensor", opts.no_color),
        table
    );

    if !detail.characterisation.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Timestamp", "T", "Range", "P", "U", "R", "Dev"]);
        for row in &detail.characterisation {
            builder.push_record([
                format_timestamp(row.timestamp),
                format!("{:.2}", row.temperature),
                row.range.to_string(),
                format!("{:.4}", row.pressure),
                format!("{:.3}", row.voltage),
                format!("{:.1}", row.resistance),
                format!("{:.4}", row.deviation),
            ]);
        }
        let mut table = builder.build();
        style::apply_table_style(&mut table);
        output.push_str(&format!(
            "\n{}\n{}\n",
            style::format_title("Characterisation", opts.no_color),
            table
        ));
    }

    for set in &detail.coefficients {
        let mut builder = Builder::default();
        builder.push_record(["Index", "Value"]);
        for entry in &set.entries {
            builder.push_record([entry.index.to_string(), format!("{}", entry.value)]);
        }
        let mut table = builder.build();
        style::apply_table_style(&mut table);
        output.push_str(&format!(
            "\n{}\n{}\n",
            style::format_title(
                &format!("Coefficients ({})", format_timestamp(set.effective_date)),
                opts.no_color
            ),
            table
        ));
    }

    if !detail.verification.is_empty() {
        let mut builder = Builder::default();
        builder.push_record([
            "Timestamp", "T", "NPI", "VPI", "P set", "P real", "I set", "I real", "U", "R",
        ]);
        for row in &detail.verification {
            builder.push_record([
                format_timestamp(row.timestamp),
                format!("{:.2}", row.temperature),
                format!("{}", row.npi),
                format!("{}", row.vpi),
                format!("{:.4}", row.pressure_given),
                format!("{:.4}", row.pressure_real),
                format!("{:.3}", row.current_given),
                format!("{:.3}", row.current_real),
                format!("{:.2}", row.voltage),
                format!("{:.1}", row.resistance),
            ]);
        }
        let mut table = builder.build();
        style::apply_table_style(&mut table);
        output.push_str(&format!(
            "\n{}\n{}\n",
            style::format_title("Verification", opts.no_color),
            table
        ));
    }

    output
}

// ============================================================================
// Ingest results
// ============================================================================

/// One line describing what happened to a file.
#[must_use]
pub fn format_file_result(result: &FileResult, opts: &FormatOptions) -> String {
    let name = result
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| result.path.display().to_string());

    match &result.status {
        FileStatus::Written { report } => {
            let message = format!(
                "{}: {} ({} rows inserted, {} duplicate)",
                name,
                style::format_outcome(report.outcome, opts.no_color),
                report.inserted.total(),
                report.duplicates.total()
            );
            style::format_success(&message, opts.no_color)
        }
        FileStatus::Defective { reason, moved_to } => style::format_warning(
            &format!(
                "{}: defective, {}; moved to {}",
                name,
                reason,
                moved_to.display()
            ),
            opts.no_color,
        ),
        FileStatus::Failed { error } => {
            style::format_error(&format!("{}: {}", name, error), opts.no_color)
        }
    }
}

#[must_use]
pub fn format_sync_text(result: &SyncResult, opts: &FormatOptions) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Files", "Count"]);
    builder.push_record(["Written".to_string(), result.written.to_string()]);
    builder.push_record([
        "Partially duplicated".to_string(),
        result.partially_duplicated.to_string(),
    ]);
    builder.push_record(["Duplicated".to_string(), result.duplicated.to_string()]);
    builder.push_record(["Defective".to_string(), result.defective.to_string()]);
    builder.push_record(["Failed".to_string(), result.failed.to_string()]);
    let mut files = builder.build();
    style::apply_table_style(&mut files);

    let mut builder = Builder::default();
    builder.push_record(["Rows", "Inserted", "Duplicate"]);
    for (label, inserted, duplicate) in [
        (
            "Characterisation",
            result.inserted_rows.characterisation,
            result.duplicate_rows.characterisation,
        ),
        (
            "Coefficients",
            result.inserted_rows.coefficients,
            result.duplicate_rows.coefficients,
        ),
        (
            "Verification",
            result.inserted_rows.verification,
            result.duplicate_rows.verification,
        ),
    ] {
        builder.push_record([label.to_string(), inserted.to_string(), duplicate.to_string()]);
    }
    let mut rows = builder.build();
    style::apply_table_style(&mut rows);

    let headline = if result.cancelled {
        style::format_warning("Sync cancelled; checkpoint not advanced", opts.no_color)
    } else if result.failed > 0 {
        style::format_error(
            &format!(
                "Sync finished with {} failed file(s); checkpoint not advanced",
                result.failed
            ),
            opts.no_color,
        )
    } else {
        style::format_success("Sync complete", opts.no_color)
    };

    let mut output = format!("{}\n{}\n{}\n", headline, files, rows);
    if result.skipped_rows > 0 {
        output.push_str(&format!("Skipped malformed rows: {}\n", result.skipped_rows));
    }
    output
}

// ============================================================================
// Status
// ============================================================================

#[must_use]
pub fn format_status_text(
    database: &str,
    checkpoint: &Checkpoint,
    stats: Option<&StoreStats>,
    archive: Option<&str>,
    opts: &FormatOptions,
) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Property", "Value"]);
    builder.push_record(["Database".to_string(), database.to_string()]);
    builder.push_record([
        "Archive".to_string(),
        archive.unwrap_or("(not configured)").to_string(),
    ]);
    builder.push_record(["Last scan".to_string(), format_instant(checkpoint.last_scan)]);
    builder.push_record(["Last sync".to_string(), format_instant(checkpoint.last_sync)]);
    match stats {
        Some(stats) => {
            builder.push_record(["Sensors".to_string(), stats.sensors.to_string()]);
            builder.push_record([
                "Characterisation rows".to_string(),
                stats.characterisation.to_string(),
            ]);
            builder.push_record([
                "Coefficient rows".to_string(),
                stats.coefficients.to_string(),
            ]);
            builder.push_record([
                "Verification rows".to_string(),
                stats.verification.to_string(),
            ]);
        }
        None => {
            builder.push_record([
                "Sensors".to_string(),
                "(database not initialised)".to_string(),
            ]);
        }
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table);
    format!(
        "{}\n{}\n",
        style::format_title("calbench status", opts.no_color),
        table
    )
}

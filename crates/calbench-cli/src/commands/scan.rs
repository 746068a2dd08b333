//! Scan command - list archive files newer than the checkpoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use calbench_core::{ScanResult, TracingSink};
use tabled::builder::Builder;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;

use super::RunContext;
use crate::cli::{ArchiveArgs, OutputFormat};
use crate::config::Config;
use crate::style;
use crate::util::{open_engine, require_archive, resolve_watermark, write_json, write_output};

/// Execute the scan command.
pub async fn cmd_scan(
    args: ArchiveArgs,
    ctx: &RunContext,
    config: &Config,
    cancel: CancellationToken,
) -> Result<()> {
    let root = require_archive(&args, config)?;
    let watermark = resolve_watermark(&args, config);
    let engine = open_engine(&ctx.db_path, config, Arc::new(TracingSink))?;

    let spinner = (!ctx.quiet && ctx.format == OutputFormat::Text)
        .then(|| style::operation_spinner(&format!("Scanning {}...", root.display())));

    let result = engine
        .scan(&root, watermark, cancel)
        .await
        .context("Scan failed");

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let result = result?;

    match ctx.format {
        OutputFormat::Json => write_json(&result),
        OutputFormat::Text => write_output(&format_scan_text(&result, ctx.opts.no_color)?),
    }
}

fn format_scan_text(result: &ScanResult, no_color: bool) -> Result<String> {
    if result.cancelled {
        return Ok(format!(
            "{}\n",
            style::format_warning("Scan cancelled; checkpoint not advanced", no_color)
        ));
    }
    if result.files.is_empty() {
        return Ok(format!(
            "{}\n",
            style::format_success("No new files in the archive", no_color)
        ));
    }

    let mut builder = Builder::default();
    builder.push_record(["Created", "Kind", "File"]);
    for file in &result.files {
        builder.push_record([
            file.created_at.format(&Rfc3339)?,
            file.kind.to_string(),
            file.path.display().to_string(),
        ]);
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table);

    Ok(format!(
        "{}\n{}\n",
        style::format_title(
            &format!("{} file(s) to ingest", result.files.len()),
            no_color
        ),
        table
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calbench_core::IngestFile;
    use calbench_types::FileKind;
    use std::path::PathBuf;
    use time::macros::datetime;

    #[test]
    fn test_format_scan_text() {
        let result = ScanResult {
            files: vec![IngestFile {
                path: PathBuf::from("/srv/2024/CH_FN_1.txt"),
                kind: FileKind::Characterisation,
                created_at: datetime!(2024-03-01 10:00 UTC),
            }],
            cancelled: false,
        };
        let text = format_scan_text(&result, true).unwrap();
        assert!(text.starts_with("1 file(s) to ingest"));
        assert!(text.contains("2024-03-01T10:00:00Z"));
        assert!(text.contains("CH_FN_1.txt"));
    }

    #[test]
    fn test_format_scan_text_empty_and_cancelled() {
        let empty = ScanResult::default();
        assert!(format_scan_text(&empty, true).unwrap().contains("No new files"));

        let cancelled = ScanResult {
            cancelled: true,
            ..Default::default()
        };
        assert!(format_scan_text(&cancelled, true).unwrap().contains("cancelled"));
    }
}

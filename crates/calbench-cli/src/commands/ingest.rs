//! Ingest command - process one bench file outside of a sync.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use calbench_core::{FileResult, IngestEvent, MemorySink, Severity};
use serde::Serialize;

use super::RunContext;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::format_file_result;
use crate::style;
use crate::util::{open_engine, write_json, write_output};

#[derive(Serialize)]
struct IngestReport {
    #[serde(flatten)]
    result: FileResult,
    events: Vec<IngestEvent>,
}

/// Execute the ingest command.
///
/// Checkpoints are left untouched.
pub async fn cmd_ingest(file: PathBuf, ctx: &RunContext, config: &Config) -> Result<()> {
    let events = Arc::new(MemorySink::new());
    let engine = open_engine(&ctx.db_path, config, Arc::clone(&events) as _)?;

    let result = engine
        .process_single_file(&file)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    match ctx.format {
        OutputFormat::Json => write_json(&IngestReport {
            result,
            events: events.drain(),
        }),
        OutputFormat::Text => {
            let mut output = String::new();
            if !ctx.quiet {
                for event in events
                    .drain()
                    .into_iter()
                    .filter(|e| e.severity == Severity::Warning)
                {
                    output.push_str(&style::format_warning(&event.message, ctx.opts.no_color));
                    output.push('\n');
                }
            }
            output.push_str(&format_file_result(&result, &ctx.opts));
            output.push('\n');
            write_output(&output)
        }
    }
}

//! Status command - checkpoints and store statistics.

use anyhow::{Context, Result};
use calbench_core::CheckpointStore;
use calbench_store::StoreStats;
use serde::Serialize;
use time::OffsetDateTime;

use super::RunContext;
use crate::cli::OutputFormat;
use crate::config::{Config, resolve_archive};
use crate::format::format_status_text;
use crate::util::{open_store, write_json, write_output};

#[derive(Serialize)]
struct StatusReport {
    database: String,
    initialised: bool,
    archive: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    last_scan: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    last_sync: Option<OffsetDateTime>,
    stats: Option<StoreStats>,
}

/// Execute the status command.
pub fn cmd_status(ctx: &RunContext, config: &Config) -> Result<()> {
    let checkpoints = CheckpointStore::beside_database(&ctx.db_path);
    let checkpoint = checkpoints.load().with_context(|| {
        format!(
            "Failed to read checkpoint file {}",
            checkpoints.path().display()
        )
    })?;

    let stats = if ctx.db_path.exists() {
        Some(open_store(&ctx.db_path)?.stats()?)
    } else {
        None
    };
    let database = ctx.db_path.display().to_string();
    let archive = resolve_archive(std::env::var_os("CALBENCH_ARCHIVE").map(Into::into), config)
        .map(|p| p.display().to_string());

    match ctx.format {
        OutputFormat::Json => write_json(&StatusReport {
            database,
            initialised: stats.is_some(),
            archive,
            last_scan: checkpoint.last_scan,
            last_sync: checkpoint.last_sync,
            stats,
        }),
        OutputFormat::Text => write_output(&format_status_text(
            &database,
            &checkpoint,
            stats.as_ref(),
            archive.as_deref(),
            &ctx.opts,
        )),
    }
}

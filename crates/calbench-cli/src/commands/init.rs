//! Init command - create the database and checkpoint sidecar.

use anyhow::{Context, Result};
use calbench_core::CheckpointStore;
use calbench_store::Store;
use serde::Serialize;

use super::RunContext;
use crate::cli::OutputFormat;
use crate::style;
use crate::util::{write_json, write_output};

#[derive(Debug, Serialize)]
struct InitReport {
    database: String,
    database_created: bool,
    checkpoint: String,
    checkpoint_created: bool,
}

/// Execute the init command.
pub fn cmd_init(ctx: &RunContext) -> Result<()> {
    let database_created = !ctx.db_path.exists();
    // Opening creates the file and schema when missing.
    Store::open(&ctx.db_path)
        .with_context(|| format!("Failed to create database {}", ctx.db_path.display()))?;

    let checkpoints = CheckpointStore::beside_database(&ctx.db_path);
    let checkpoint_created = checkpoints.initialize().with_context(|| {
        format!(
            "Failed to create checkpoint file {}",
            checkpoints.path().display()
        )
    })?;

    let report = InitReport {
        database: ctx.db_path.display().to_string(),
        database_created,
        checkpoint: checkpoints.path().display().to_string(),
        checkpoint_created,
    };

    match ctx.format {
        OutputFormat::Json => write_json(&report),
        OutputFormat::Text => {
            let no_color = ctx.opts.no_color;
            let line = |created: bool, what: &str, path: &str| {
                if created {
                    style::format_success(&format!("Created {} {}", what, path), no_color)
                } else {
                    style::format_info(&format!("{} already exists: {}", what, path), no_color)
                }
            };
            write_output(&format!(
                "{}\n{}\n",
                line(report.database_created, "database", &report.database),
                line(report.checkpoint_created, "checkpoint file", &report.checkpoint)
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatOptions;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_database_and_checkpoint() {
        let dir = tempdir().unwrap();
        let ctx = RunContext {
            db_path: dir.path().join("bench").join("calbench.db"),
            format: OutputFormat::Json,
            quiet: true,
            opts: FormatOptions::new(true),
        };

        cmd_init(&ctx).unwrap();
        assert!(ctx.db_path.exists());
        let checkpoints = CheckpointStore::beside_database(&ctx.db_path);
        assert!(checkpoints.exists());
        assert_eq!(checkpoints.load().unwrap().last_sync, None);

        // Second run leaves both in place.
        cmd_init(&ctx).unwrap();
        assert!(ctx.db_path.exists());
    }
}

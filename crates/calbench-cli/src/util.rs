//! Utility functions for CLI operations.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use calbench_core::{
    CheckpointStore, EventSink, Pipeline, Quarantine, ScanOptions, SyncEngine, Thresholds,
    Watermark,
};
use calbench_store::Store;
use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::cli::ArchiveArgs;
use crate::config::{Config, resolve_archive};

/// Open the store at `db_path`, with a hint when it was never initialised.
pub fn open_store(db_path: &Path) -> Result<Store> {
    if !db_path.exists() {
        bail!(
            "No database at {}.\n\
             Run 'calbench init' to create it, or pass --db <PATH>.",
            db_path.display()
        );
    }
    Store::open(db_path).with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// Build the ingest pipeline described by `config`, reporting to `events`.
pub fn build_pipeline(config: &Config, events: Arc<dyn EventSink>) -> Pipeline {
    Pipeline::new()
        .with_parser(config.parser_options())
        .with_thresholds(Thresholds::new(config.thresholds.clone()))
        .with_quarantine(Quarantine::new(config.defect_dir.clone()))
        .with_events(events)
}

/// Open a sync engine over the database at `db_path`.
pub fn open_engine(
    db_path: &Path,
    config: &Config,
    events: Arc<dyn EventSink>,
) -> Result<SyncEngine<Store>> {
    let store = open_store(db_path)?;
    Ok(SyncEngine::builder(store, CheckpointStore::beside_database(db_path))
        .pipeline(build_pipeline(config, events))
        .scan_options(scan_options(config))
        .build())
}

/// Scan options for `config`. A configured quarantine directory is never
/// scanned, whatever its name.
pub fn scan_options(config: &Config) -> ScanOptions {
    let mut options = ScanOptions {
        time_source: config.time_source,
        ..ScanOptions::default()
    };
    if let Some(name) = config
        .defect_dir
        .as_deref()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        && !options.skip_dirs.iter().any(|skip| skip == name)
    {
        options.skip_dirs.push(name.to_string());
    }
    options
}

/// Archive root from flags or config, with a helpful error message.
pub fn require_archive(args: &ArchiveArgs, config: &Config) -> Result<PathBuf> {
    resolve_archive(args.archive.clone(), config).ok_or_else(|| {
        anyhow::anyhow!(
            "No archive specified. Use --archive <DIR>, set CALBENCH_ARCHIVE, \
             or set 'archive' in {}.",
            Config::path().display()
        )
    })
}

/// Watermark selected by `--all`/`--since`, falling back to config.
pub fn resolve_watermark(args: &ArchiveArgs, config: &Config) -> Watermark {
    if args.all {
        Watermark::All
    } else if let Some(since) = args.since {
        Watermark::Since(since)
    } else {
        config.watermark
    }
}

/// Ask for confirmation unless `yes` was given.
///
/// Non-interactive sessions must pass `--yes`.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        bail!("Refusing to continue without confirmation. Pass --yes to skip the prompt.");
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

/// Print `content` to stdout.
pub fn write_output(content: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Print a value as pretty JSON.
pub fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    content.push('\n');
    write_output(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calbench_core::TimeSource;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn args(all: bool, since: Option<time::OffsetDateTime>) -> ArchiveArgs {
        ArchiveArgs {
            archive: None,
            all,
            since,
        }
    }

    #[test]
    fn test_resolve_watermark() {
        let config = Config {
            watermark: Watermark::LastScan,
            ..Default::default()
        };
        assert_eq!(resolve_watermark(&args(true, None), &config), Watermark::All);
        let since = datetime!(2024-01-01 0:00 UTC);
        assert_eq!(
            resolve_watermark(&args(false, Some(since)), &config),
            Watermark::Since(since)
        );
        assert_eq!(
            resolve_watermark(&args(false, None), &config),
            Watermark::LastScan
        );
    }

    #[test]
    fn test_require_archive_without_config() {
        let err = require_archive(&args(false, None), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("No archive specified"));
    }

    #[test]
    fn test_open_store_requires_init() {
        let dir = tempdir().unwrap();
        let err = open_store(&dir.path().join("missing.db")).unwrap_err();
        assert!(err.to_string().contains("calbench init"));
    }

    #[test]
    fn test_confirm_with_yes() {
        assert!(confirm("Proceed?", true).unwrap());
    }

    #[test]
    fn test_scan_skips_configured_defect_dir() {
        assert_eq!(scan_options(&Config::default()).skip_dirs, vec!["defect"]);

        let config = Config {
            defect_dir: Some(PathBuf::from("/srv/bench/rejected")),
            time_source: TimeSource::Modified,
            ..Default::default()
        };
        let options = scan_options(&config);
        assert_eq!(options.skip_dirs, vec!["defect", "rejected"]);
        assert_eq!(options.time_source, TimeSource::Modified);

        let config = Config {
            defect_dir: Some(PathBuf::from("/srv/bench/defect")),
            ..Default::default()
        };
        assert_eq!(scan_options(&config).skip_dirs, vec!["defect"]);
    }

    #[test]
    fn test_pipeline_uses_configured_thresholds() {
        let mut config = Config::default();
        config.thresholds.max_spread_hours = 12;
        let pipeline = build_pipeline(&config, Arc::new(calbench_core::MemorySink::new()));
        assert_eq!(pipeline.thresholds().config().max_spread_hours, 12);
    }
}

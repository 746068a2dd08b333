//! Sync command - scan the archive and ingest new files.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use calbench_core::{
    ChannelSink, EventReceiver, EventSink, IngestEvent, MemorySink, Severity, SyncProgress,
    SyncResult,
};
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::RunContext;
use crate::cli::{ArchiveArgs, OutputFormat};
use crate::config::Config;
use crate::format::format_sync_text;
use crate::style;
use crate::util::{confirm, open_engine, require_archive, resolve_watermark, write_json, write_output};

/// Arguments for the sync command.
pub struct SyncArgs {
    pub archive: ArchiveArgs,
    pub yes: bool,
}

#[derive(Serialize)]
struct SyncReport<'a> {
    #[serde(flatten)]
    result: &'a SyncResult,
    events: Vec<IngestEvent>,
}

/// Execute the sync command.
pub async fn cmd_sync(
    args: SyncArgs,
    ctx: &RunContext,
    config: &Config,
    cancel: CancellationToken,
) -> Result<()> {
    let root = require_archive(&args.archive, config)?;
    let watermark = resolve_watermark(&args.archive, config);
    let interactive = !ctx.quiet && ctx.format == OutputFormat::Text;

    let channel = ChannelSink::default();
    let memory = Arc::new(MemorySink::new());
    let events: Arc<dyn EventSink> = Arc::new((channel.clone(), Arc::clone(&memory)));
    let engine = open_engine(&ctx.db_path, config, events)?;

    let spinner = interactive.then(|| style::operation_spinner(&format!("Scanning {}...", root.display())));
    let scan = engine.scan(&root, watermark, cancel.clone()).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let scan = scan.context("Scan failed")?;

    if scan.cancelled {
        if ctx.format == OutputFormat::Json {
            return write_json(&scan);
        }
        return write_output(&format!(
            "{}\n",
            style::format_warning("Scan cancelled; nothing ingested", ctx.opts.no_color)
        ));
    }

    let total = scan.files.len();
    if total > 0 {
        let prompt = format!(
            "Ingest {} file(s) from {} into {}?",
            total,
            root.display(),
            ctx.db_path.display()
        );
        if !confirm(&prompt, args.yes)? {
            eprintln!("Aborted.");
            return Ok(());
        }
    }
    info!("Syncing {} file(s) from {}", total, root.display());

    let pb = if interactive {
        style::sync_progress_bar(total as u64)
    } else {
        ProgressBar::hidden()
    };
    let printer = spawn_event_printer(channel.subscribe(), pb.clone(), ctx.quiet, ctx.opts.no_color);

    let progress_bar = pb.clone();
    let result = engine
        .sync(scan.files, cancel, move |progress: SyncProgress| {
            progress_bar.set_position(progress.processed as u64);
            if let Some(name) = progress.current.file_name() {
                progress_bar.set_message(name.to_string_lossy().into_owned());
            }
        })
        .await;
    pb.finish_and_clear();

    // Close the channel so the printer drains and exits.
    drop(engine);
    drop(channel);
    if let Err(e) = printer.await {
        warn!("Event printer stopped: {}", e);
    }

    let result = result.context("Sync failed")?;

    match ctx.format {
        OutputFormat::Json => write_json(&SyncReport {
            result: &result,
            events: memory.drain(),
        })?,
        OutputFormat::Text => write_output(&format_sync_text(&result, &ctx.opts))?,
    }

    if result.failed > 0 {
        bail!("{} file(s) failed to ingest", result.failed);
    }
    Ok(())
}

/// Print warnings, rejections and errors above the progress bar as they arrive.
fn spawn_event_printer(
    mut events: EventReceiver,
    pb: ProgressBar,
    quiet: bool,
    no_color: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let show = match event.severity {
                        Severity::Info => false,
                        Severity::Warning => !quiet,
                        Severity::Error | Severity::Reject => true,
                    };
                    if show {
                        let message = format!("{}: {}", event.file, event.message);
                        style::print_suspended(
                            &pb,
                            &style::format_event(event.severity, &message, no_color),
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    style::print_suspended(
                        &pb,
                        &style::format_warning(
                            &format!("{} event(s) not shown", skipped),
                            no_color,
                        ),
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

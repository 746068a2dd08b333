mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use human_panic::setup_panic;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{RemoveArgs, RunContext, SensorsArgs, SyncArgs};
use config::{Config, resolve_database};
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic!();

    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "calbench", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let ctx = RunContext {
        db_path: resolve_database(cli.db.clone(), &config),
        format: cli.format(),
        quiet: cli.quiet,
        opts: FormatOptions::new(cli.no_color || config.no_color),
    };
    debug!("Using database {}", ctx.db_path.display());

    // Ctrl-C cancels a running scan or sync; the current file still finishes.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current file...");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Init => commands::cmd_init(&ctx),
        Commands::Scan { archive } => commands::cmd_scan(archive, &ctx, &config, cancel).await,
        Commands::Sync { archive, yes } => {
            commands::cmd_sync(SyncArgs { archive, yes }, &ctx, &config, cancel).await
        }
        Commands::Ingest { file } => commands::cmd_ingest(file, &ctx, &config).await,
        Commands::Sensors {
            serial,
            month,
            sensor_type,
            model,
        } => commands::cmd_sensors(
            SensorsArgs {
                serial,
                month,
                sensor_type,
                model,
            },
            &ctx,
        ),
        Commands::Show { sensor_id, limit } => commands::cmd_show(sensor_id, limit, &ctx),
        Commands::Remove {
            sensor_id,
            kind,
            yes,
        } => commands::cmd_remove(
            RemoveArgs {
                sensor_id,
                kinds: kind,
                yes,
            },
            &ctx,
        ),
        Commands::Status => commands::cmd_status(&ctx, &config),
        Commands::Config { action } => commands::cmd_config(action, &config, ctx.opts.no_color),
        Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }
}

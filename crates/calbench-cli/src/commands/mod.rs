//! Command implementations for the CLI.

mod config;
mod ingest;
mod init;
mod remove;
mod scan;
mod sensors;
mod show;
mod status;
mod sync;

pub use config::cmd_config;
pub use ingest::cmd_ingest;
pub use init::cmd_init;
pub use remove::{RemoveArgs, cmd_remove};
pub use scan::cmd_scan;
pub use sensors::{SensorsArgs, cmd_sensors};
pub use show::cmd_show;
pub use status::cmd_status;
pub use sync::{SyncArgs, cmd_sync};

use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::format::FormatOptions;

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub db_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
    pub opts: FormatOptions,
}

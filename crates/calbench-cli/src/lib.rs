//! Command-line interface for calibration bench archives.
//!
//! The `calbench` binary walks an archive of characterisation (`CH_FN_*.txt`)
//! and verification (`VR_FN_*.txt`) files written by the benches, rejects
//! defective runs into `defect/` directories and stores everything else in a
//! local SQLite database.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create the database and checkpoint file |
//! | `scan` | List archive files newer than the checkpoint |
//! | `sync` | Scan and ingest new files with a progress bar |
//! | `ingest` | Ingest one file, leaving checkpoints alone |
//! | `sensors` | List sensors, or serials characterised in a month |
//! | `show` | Rows and coefficient sets of one sensor |
//! | `remove` | Delete a sensor's data, and the sensor once empty |
//! | `status` | Checkpoints and row counts |
//! | `config` | Show, locate or initialise the config file |
//! | `completions` | Generate shell completions |
//!
//! Every command accepts `--json` for machine-readable output. Ctrl-C during
//! `scan` or `sync` stops after the current file; the sync checkpoint only
//! advances when a batch completes without failures.
//!
//! # Configuration
//!
//! The CLI reads `~/.config/calbench/config.toml` (or platform equivalent):
//!
//! ```toml
//! archive = "/srv/bench"
//! watermark = "last-sync"
//!
//! [thresholds]
//! max_spread_hours = 168
//!
//! [thresholds.eni100.resistance]
//! min = 3000.0
//! max = 7000.0
//!
//! [catalog]
//! eni100 = ["ДИ", "ДА", "ДВ", "ДИВ", "ДД", "ДГ"]
//! ```
//!
//! # Environment Variables
//!
//! - `CALBENCH_DB`: Database file (overridden by `--db`)
//! - `CALBENCH_ARCHIVE`: Archive root (overridden by `--archive`)
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--quiet` nor `--verbose` is given

// Re-export the engine crates for convenience
pub use calbench_core;
pub use calbench_store;
pub use calbench_types;

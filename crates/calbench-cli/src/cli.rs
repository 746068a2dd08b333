//! CLI argument definitions using clap.

use std::path::PathBuf;

use calbench_types::DataKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Data class selector for `remove`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Characterisation readings
    Characterisation,
    /// Sensor coefficients
    Coefficients,
    /// Verification readings
    Verification,
}

impl From<KindArg> for DataKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Characterisation => DataKind::Characterisation,
            KindArg::Coefficients => DataKind::Coefficients,
            KindArg::Verification => DataKind::Verification,
        }
    }
}

/// Reusable archive selection arguments
#[derive(Debug, Clone, Args)]
pub struct ArchiveArgs {
    /// Archive root directory, or use CALBENCH_ARCHIVE env var
    #[arg(short, long, env = "CALBENCH_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Select every file regardless of checkpoints
    #[arg(long, conflicts_with = "since")]
    pub all: bool,

    /// Select files created after this date/time (RFC3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_since)]
    pub since: Option<OffsetDateTime>,
}

#[derive(Parser)]
#[command(name = "calbench")]
#[command(author, version, about = "Ingest calibration bench archives into a record store", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Database file, or use CALBENCH_DB env var
    #[arg(long, global = true, env = "CALBENCH_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Output format selected by the global flags.
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and checkpoint file
    Init,

    /// List archive files waiting to be ingested
    Scan {
        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Scan the archive and ingest new files
    Sync {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Ingest a single bench file
    Ingest {
        /// Path to a CH_FN_* or VR_FN_* file
        file: PathBuf,
    },

    /// List stored sensors
    Sensors {
        /// Show every type/model variant of a serial number
        #[arg(short, long, conflicts_with = "month")]
        serial: Option<String>,

        /// List serials characterised in a month (YYYY-MM)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<(i32, Month)>,

        /// Filter by sensor type
        #[arg(short = 't', long = "type")]
        sensor_type: Option<String>,

        /// Filter by model
        #[arg(long)]
        model: Option<String>,
    },

    /// Show stored rows and coefficient sets for a sensor
    Show {
        /// Sensor id (see `calbench sensors`)
        sensor_id: i64,

        /// Maximum number of rows per table (0 for all)
        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,
    },

    /// Remove stored data for a sensor
    #[command(alias = "rm")]
    Remove {
        /// Sensor id (see `calbench sensors`)
        sensor_id: i64,

        /// Data to remove (repeatable; default: everything)
        #[arg(short, long, value_enum)]
        kind: Vec<KindArg>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show checkpoints and store statistics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse a `--since` value: RFC3339, or a bare date taken as UTC midnight.
pub fn parse_since(s: &str) -> Result<OffsetDateTime, String> {
    use time::format_description::well_known::Rfc3339;

    if let Ok(at) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(at);
    }
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(s, &format)
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
        .map_err(|_| format!("'{}' is not RFC3339 or YYYY-MM-DD", s))
}

/// Parse a `YYYY-MM` month.
pub fn parse_month(s: &str) -> Result<(i32, Month), String> {
    let invalid = || format!("Invalid month '{}'. Expected YYYY-MM", s);
    let (year, month) = s.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Ok((year, month))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use time::macros::datetime;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-03"), Ok((2024, Month::March)));
        assert_eq!(parse_month("2023-12"), Ok((2023, Month::December)));
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("2024").is_err());
        assert!(parse_month("March").is_err());
    }

    #[test]
    fn test_parse_since_accepts_date_and_rfc3339() {
        assert_eq!(
            parse_since("2024-03-01").unwrap(),
            datetime!(2024-03-01 0:00 UTC)
        );
        assert_eq!(
            parse_since("2024-03-01T12:30:00+03:00").unwrap(),
            datetime!(2024-03-01 12:30 +3)
        );
        assert!(parse_since("01.03.2024").is_err());
    }

    #[test]
    fn test_json_flag_selects_json_format() {
        let cli = Cli::try_parse_from(["calbench", "--json", "status"]).unwrap();
        assert_eq!(cli.format(), OutputFormat::Json);
        let cli = Cli::try_parse_from(["calbench", "status"]).unwrap();
        assert_eq!(cli.format(), OutputFormat::Text);
    }

    #[test]
    fn test_all_conflicts_with_since() {
        let result =
            Cli::try_parse_from(["calbench", "scan", "--all", "--since", "2024-01-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_kinds() {
        let cli = Cli::try_parse_from([
            "calbench",
            "remove",
            "7",
            "--kind",
            "verification",
            "--kind",
            "coefficients",
        ])
        .unwrap();
        let Commands::Remove { sensor_id, kind, .. } = cli.command else {
            panic!("expected remove");
        };
        assert_eq!(sensor_id, 7);
        assert_eq!(kind, vec![KindArg::Verification, KindArg::Coefficients]);
        assert_eq!(DataKind::from(kind[0]), DataKind::Verification);
    }
}

//! Config command - inspect and initialise the configuration file.

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::style;
use crate::util::write_output;

/// Execute the config command.
pub fn cmd_config(action: ConfigAction, config: &Config, no_color: bool) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
            write_output(&content)
        }
        ConfigAction::Path => write_output(&format!("{}\n", Config::path().display())),
        ConfigAction::Init { force } => {
            let path = Config::path();
            if path.exists() && !force {
                bail!(
                    "Config file already exists: {}\nUse --force to overwrite it.",
                    path.display()
                );
            }
            Config::default().save()?;
            write_output(&format!(
                "{}\n",
                style::format_success(
                    &format!("Wrote default config to {}", path.display()),
                    no_color
                )
            ))
        }
    }
}

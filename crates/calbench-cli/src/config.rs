//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calbench_core::{ParserOptions, ThresholdConfig, TimeSource, Watermark};
use calbench_types::ModelCatalog;
use serde::{Deserialize, Serialize};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database file (default: platform data directory)
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Archive root scanned by `scan` and `sync`
    #[serde(default)]
    pub archive: Option<PathBuf>,

    /// Single quarantine directory for defective files.
    /// When unset, a `defect` directory is created next to each file.
    #[serde(default)]
    pub defect_dir: Option<PathBuf>,

    /// Checkpoint that bounds a scan: "last-sync" or "last-scan"
    #[serde(default)]
    pub watermark: Watermark,

    /// File timestamp compared against the checkpoint: "created" or "modified"
    #[serde(default)]
    pub time_source: TimeSource,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Defect classification envelopes
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Known model codes per family
    #[serde(default)]
    pub catalog: ModelCatalog,

    /// File layout settings
    #[serde(default)]
    pub parser: ParserOptions,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbench")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from a specific file, or return default if not found
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Parser options with the configured catalog applied.
    pub fn parser_options(&self) -> ParserOptions {
        self.parser.clone().with_catalog(self.catalog.clone())
    }
}

/// Resolve the database path from flag/env, config, or the platform default.
pub fn resolve_database(db: Option<PathBuf>, config: &Config) -> PathBuf {
    db.or_else(|| config.database.clone())
        .unwrap_or_else(calbench_store::default_db_path)
}

/// Resolve the archive root from flag/env or config.
pub fn resolve_archive(archive: Option<PathBuf>, config: &Config) -> Option<PathBuf> {
    archive.or_else(|| config.archive.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_database_prefers_arg() {
        let config = Config {
            database: Some(PathBuf::from("/config/bench.db")),
            ..Default::default()
        };
        let result = resolve_database(Some(PathBuf::from("/arg/bench.db")), &config);
        assert_eq!(result, PathBuf::from("/arg/bench.db"));
    }

    #[test]
    fn test_resolve_database_falls_back_to_config() {
        let config = Config {
            database: Some(PathBuf::from("/config/bench.db")),
            ..Default::default()
        };
        assert_eq!(
            resolve_database(None, &config),
            PathBuf::from("/config/bench.db")
        );
    }

    #[test]
    fn test_resolve_database_defaults_to_data_dir() {
        let result = resolve_database(None, &Config::default());
        assert_eq!(result, calbench_store::default_db_path());
    }

    #[test]
    fn test_resolve_archive() {
        let config = Config {
            archive: Some(PathBuf::from("/srv/bench")),
            ..Default::default()
        };
        assert_eq!(
            resolve_archive(None, &config),
            Some(PathBuf::from("/srv/bench"))
        );
        assert_eq!(
            resolve_archive(Some(PathBuf::from("/mnt/a")), &config),
            Some(PathBuf::from("/mnt/a"))
        );
        assert_eq!(resolve_archive(None, &Config::default()), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            archive = "/srv/bench"
            watermark = "last-scan"

            [thresholds]
            max_spread_hours = 72

            [thresholds.eni100.resistance]
            min = 3500.0
            max = 6500.0
            "#,
        )
        .unwrap();

        assert_eq!(config.archive, Some(PathBuf::from("/srv/bench")));
        assert_eq!(config.watermark, Watermark::LastScan);
        assert_eq!(config.time_source, TimeSource::Created);
        assert_eq!(config.thresholds.max_spread_hours, 72);
        assert_eq!(config.thresholds.eni100.resistance.max, 6500.0);
        // Untouched families keep their defaults.
        assert_eq!(
            config.thresholds.eni12,
            ThresholdConfig::default().eni12
        );
        assert_eq!(config.parser, ParserOptions::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.archive = Some(PathBuf::from("/srv/bench"));
        config.catalog.eni12.push("ДГ".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.archive, config.archive);
        assert!(loaded.catalog.eni12.contains(&"ДГ".to_string()));
        assert_eq!(loaded.thresholds, ThresholdConfig::default());
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "watermark = 42").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.watermark, Watermark::LastSync);
    }

    #[test]
    fn test_parser_options_carry_catalog() {
        let mut config = Config::default();
        config.catalog = ModelCatalog::empty();
        assert_eq!(config.parser_options().catalog, ModelCatalog::empty());
    }
}

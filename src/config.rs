use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::pipeline::processing::recurrence::RecurrenceMode;

pub const DEFAULT_CONFIG_PATH: &str = "fec_pipeline.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub ingest: IngestConfig,
    pub grids: GridsConfig,
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub database: PathBuf,
    /// GeoNames postal-code dump (e.g. `US.txt`)
    pub geonames: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/fec_data.db"),
            geonames: PathBuf::from("data/geonames/US.txt"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub recurrence_mode: RecurrenceMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridsConfig {
    /// `{year}` is substituted before the request is made
    pub committee_url: String,
    pub candidate_url: String,
    pub timeout_seconds: u64,
}

impl Default for GridsConfig {
    fn default() -> Self {
        Self {
            committee_url: format!("{BULK_DOWNLOAD_ROOT}/{{year}}/committee_summary_grid{{year}}.zip"),
            candidate_url: format!("{BULK_DOWNLOAD_ROOT}/{{year}}/candidate_summary_grid{{year}}.zip"),
            timeout_seconds: 300,
        }
    }
}

const BULK_DOWNLOAD_ROOT: &str =
    "https://cg-519a459a-0ea3-42c2-b7bc-fa1143481f74.s3-us-gov-west-1.amazonaws.com/bulk-downloads";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "127.0.0.1:9898".to_string(),
        }
    }
}

impl Config {
    /// Load from `FEC_PIPELINE_CONFIG` (or `fec_pipeline.toml`) and apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("FEC_PIPELINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(db) = std::env::var("FEC_DATABASE_PATH") {
            self.paths.database = PathBuf::from(db);
        }
        if let Ok(table) = std::env::var("FEC_GEONAMES_PATH") {
            self.paths.geonames = PathBuf::from(table);
        }
        if let Ok(mode) = std::env::var("FEC_RECURRENCE_MODE") {
            self.ingest.recurrence_mode = mode.parse().map_err(PipelineError::Config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.ingest.recurrence_mode, RecurrenceMode::Aggregate);
        assert!(config.grids.committee_url.ends_with("/{year}/committee_summary_grid{year}.zip"));
    }

    #[test]
    fn test_partial_toml_overrides_fields() {
        let config = Config::from_toml_str(
            r#"
            [paths]
            database = "/tmp/fec.db"

            [ingest]
            recurrence_mode = "placeholder"
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.database, PathBuf::from("/tmp/fec.db"));
        assert_eq!(config.paths.log_dir, PathBuf::from("logs"));
        assert_eq!(config.ingest.recurrence_mode, RecurrenceMode::Placeholder);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = Config::from_toml_str("[ingest]\nrecurrence_mode = \"sometimes\"\n");
        assert!(err.is_err());
    }
}

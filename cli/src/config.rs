//! CLI configuration.
//!
//! Precedence: flags > environment (`FORMSHIFT_*`, handled by clap) >
//! `formshift.toml` > built-in defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use formshift_pg::{EngineConfig, RuntimeConfig, SweeperConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Connection string; usually supplied via `FORMSHIFT_DATABASE_URL`.
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub workers: usize,
    /// Per-migration execution timeout in seconds.
    pub migration_timeout_secs: u64,
    /// Rows per UPDATE batch during restore.
    pub restore_batch_size: usize,
    /// Retention window for automatic backups, in days.
    pub retention_days: i64,
    /// Hours between retention sweeps.
    pub sweep_interval_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: 5,
            workers: 4,
            migration_timeout_secs: 30,
            restore_batch_size: 1000,
            retention_days: formshift_core::DEFAULT_RETENTION_DAYS,
            sweep_interval_hours: 24,
        }
    }
}

impl Config {
    /// Load from the given path, or from `formshift.toml` in the working
    /// directory when it exists. Absence of a config file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or("formshift.toml");
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {path}"))?;
        toml::from_str(&content).with_context(|| format!("invalid config in {path}"))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            restore_batch_size: self.restore_batch_size,
            retention_days: self.retention_days,
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            workers: self.workers,
            job_timeout: Duration::from_secs(self.migration_timeout_secs),
            ..RuntimeConfig::default()
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(self.sweep_interval_hours * 60 * 60),
        }
    }
}

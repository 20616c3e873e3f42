//! Engine configuration.
//!
//! Defaults, then an optional TOML file, then command-line overrides.

use crate::application::pipeline::PipelineSettings;
use crate::domain::risk::{AlwaysComplete, AmountThreshold, RiskPolicy};
use crate::error::{LedgerError, Result};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Nothing survives the process.
    Memory,
    /// JSON files under `data_dir`.
    File,
    /// RocksDB under `data_dir` (needs the `storage-rocksdb` feature).
    Rocksdb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    /// Simulated latency before each transition, in milliseconds.
    pub step_delay_ms: u64,
    pub append_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Transfers strictly above this amount are reversed. Unset means no limit.
    pub risk_threshold: Option<Decimal>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            data_dir: PathBuf::from("./data"),
            step_delay_ms: 500,
            append_attempts: 3,
            retry_backoff_ms: 50,
            risk_threshold: None,
        }
    }
}

impl Config {
    /// Reads a TOML file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.append_attempts == 0 {
            return Err(LedgerError::Config(
                "append_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(limit) = self.risk_threshold
            && limit <= Decimal::ZERO
        {
            return Err(LedgerError::Config(format!(
                "risk_threshold must be positive, got {limit}"
            )));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            step_delay: Duration::from_millis(self.step_delay_ms),
            append_attempts: self.append_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn risk_policy(&self) -> Box<dyn RiskPolicy> {
        match self.risk_threshold {
            Some(limit) => Box::new(AmountThreshold::new(limit)),
            None => Box::new(AlwaysComplete),
        }
    }
}

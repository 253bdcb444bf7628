//! Configuration management for UtxoChain

use crate::error::{ChainError, Result};
use crate::miner::{MiningControl, ProofOfWork, DEFAULT_CHECK_INTERVAL, DEFAULT_DIFFICULTY};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Leading zero bits required in every block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    /// Give up on a nonce search after this many seconds. `0` disables.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Nonces tried between cancellation checks.
    #[serde(default = "default_check_interval")]
    pub progress_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            timeout_secs: 0,
            progress_interval: default_check_interval(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.database.path.is_empty() {
            return Err(ChainError::Config(
                "database.path must be set in config.toml".to_string(),
            ));
        }
        self.proof_of_work()?;
        Ok(())
    }

    pub fn proof_of_work(&self) -> Result<ProofOfWork> {
        ProofOfWork::new(self.miner.difficulty)
    }

    /// A fresh cancellation handle carrying the configured timeout.
    pub fn mining_control(&self) -> MiningControl {
        let control = MiningControl::new().with_check_interval(self.miner.progress_interval);
        if self.miner.timeout_secs > 0 {
            control.with_timeout(Duration::from_secs(self.miner.timeout_secs))
        } else {
            control
        }
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ChainError::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let config = parse_config(&config_str)?;
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str).map_err(|e| ChainError::Config(e.to_string()))?
    };

    config.validate()?;
    Ok(config)
}

fn default_data_path() -> String {
    "./tmp/blocks.db".to_string()
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL
}

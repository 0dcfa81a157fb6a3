//! Configuration for elohim-provenance

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::address::Address;
use crate::error::LedgerError;
use crate::tag_registry::DEFAULT_MAX_TAG_ATTEMPTS;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("elohim-provenance")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the ledger state
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Account used for calls when none is given on the command line
    #[serde(default = "default_caller")]
    pub default_caller: Address,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Ledger host policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Candidate tag ids tried per mint before failing
    #[serde(default = "default_max_tag_attempts")]
    pub max_tag_attempts: u32,

    /// Reject traces of tags the named registry never minted
    #[serde(default)]
    pub verify_traced_tags: bool,

    /// Building window for new records when no explicit timestamp is given
    #[serde(default = "default_building_secs")]
    pub default_building_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_tag_attempts: default_max_tag_attempts(),
            verify_traced_tags: false,
            default_building_secs: default_building_secs(),
        }
    }
}

fn default_caller() -> Address {
    Address::from_label("elohim-provenance/operator")
}

fn default_max_tag_attempts() -> u32 {
    DEFAULT_MAX_TAG_ATTEMPTS
}

fn default_building_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            default_caller: default_caller(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LedgerError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get ledger state file path
    pub fn state_path(&self) -> PathBuf {
        self.storage_dir.join("ledger.json")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}

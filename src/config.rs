use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scorer::ScoringConfig;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:9000";
pub const DEFAULT_COORDINATOR_ADDR: &str = "127.0.0.1:20001";

/// Settings shared by the `airq` binaries. Every field is optional in the file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Record table to load instead of the built-in sample hours
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    /// Worker counts for the sweep; empty means "derive from the system profile"
    #[serde(default)]
    pub sweep: Vec<usize>,

    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    #[serde(default = "default_coordinator_addr")]
    pub coordinator_addr: String,
}

fn default_server_addr() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}

fn default_coordinator_addr() -> String {
    DEFAULT_COORDINATOR_ADDR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            dataset: None,
            sweep: Vec::new(),
            server_addr: default_server_addr(),
            coordinator_addr: default_coordinator_addr(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(contents)?;
        Ok(config)
    }
}

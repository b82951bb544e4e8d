//! Node configuration loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, ChainResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the block database.
    pub data_dir: PathBuf,
    /// Path of the staking identity file (certificate + secret key).
    pub identity_path: PathBuf,
    /// Interval between block proposals in the demo node.
    pub block_interval_ms: u64,
    /// Hex-encoded node addresses forming the proposer rotation. The
    /// node's own staking address joins the rotation when not listed.
    pub proposers: Vec<String>,
}

impl NodeConfig {
    /// Read a configuration file; parse failures name the offending path.
    pub fn load(path: &Path) -> ChainResult<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| {
            ChainError::Config(format!("malformed node config {}: {err}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> ChainResult<()> {
        let rendered = toml::to_string_pretty(self).map_err(|err| {
            ChainError::Config(format!("node config is not representable as TOML: {err}"))
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Create the data directory and the staking identity's parent so a
    /// first boot can write both.
    pub fn ensure_directories(&self) -> ChainResult<()> {
        for dir in [Some(self.data_dir.as_path()), self.identity_path.parent()]
            .into_iter()
            .flatten()
        {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            identity_path: PathBuf::from("./keys/staking.toml"),
            block_interval_ms: 2_000,
            proposers: Vec::new(),
        }
    }
}

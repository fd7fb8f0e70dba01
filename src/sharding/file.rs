//! Shard config file
//!
//! ```json
//! {
//!   "shards": [
//!     { "name": "alpha", "idx": 0, "address": "127.0.0.1:8080" },
//!     { "name": "beta",  "idx": 1, "address": "127.0.0.1:8081" }
//!   ]
//! }
//! ```
//!
//! The operator picks the local shard by name.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::table::{ShardId, ShardTable};
use crate::error::{Result, ShardKvError};

/// One shard as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub name: String,
    pub idx: ShardId,
    pub address: String,
}

/// Top-level config file document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardsConfig {
    pub shards: Vec<ShardEntry>,
}

impl ShardsConfig {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ShardKvError::Config(format!("invalid shard config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ShardKvError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Build the routing table with `shard_name` as the local shard
    pub fn into_table(self, shard_name: &str) -> Result<ShardTable> {
        let mut names: Vec<&str> = self.shards.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ShardKvError::Config(format!("duplicate shard name {:?}", dup[0])));
        }

        let current = self
            .shards
            .iter()
            .find(|s| s.name == shard_name)
            .map(|s| s.idx)
            .ok_or_else(|| {
                ShardKvError::Config(format!("shard {:?} was not found in the config", shard_name))
            })?;

        ShardTable::load(self.shards.into_iter().map(|s| (s.idx, s.address)), current)
    }
}

impl ShardTable {
    /// Read a shard config file and pick the local shard by name
    pub fn from_file(path: &Path, shard_name: &str) -> Result<Self> {
        ShardsConfig::from_file(path)?.into_table(shard_name)
    }
}

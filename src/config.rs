//! Configuration for ShardKV
//!
//! Centralized configuration with sensible defaults. A `Config` is built once
//! at startup and handed to every component; nothing re-reads it afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ShardKvError;

/// Main configuration for a ShardKV node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL, SSTables, etc.)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable / SSTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    /// Number of SSTables that triggers a full compaction
    pub max_sstables: usize,

    // -------------------------------------------------------------------------
    // Cluster Configuration
    // -------------------------------------------------------------------------
    /// Role of this node, fixed for the process lifetime
    pub role: NodeRole,

    /// Address of the primary for this node's shard (replicas only).
    /// When unset, the shard table address of the local shard is used.
    pub primary_addr: Option<String>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,

    /// Timeout for every inter-node request (milliseconds)
    pub request_timeout_ms: u64,

    /// Sleep between replication polls when the primary has nothing pending
    /// or is unreachable (milliseconds)
    pub replication_poll_interval_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Role of a node within its shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Accepts client writes and originates replication log entries
    Primary,

    /// Read-only mirror fed by the replication loop
    Replica,
}

impl NodeRole {
    pub fn is_replica(&self) -> bool {
        matches!(self, NodeRole::Replica)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Replica => "replica",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = ShardKvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(NodeRole::Primary),
            "replica" => Ok(NodeRole::Replica),
            other => Err(ShardKvError::Config(format!("unknown node role {:?}", other))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shardkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            max_sstables: 8,
            role: NodeRole::Primary,
            primary_addr: None,
            listen_addr: "127.0.0.1:8080".to_string(),
            request_timeout_ms: 2000,
            replication_poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn replication_poll_interval(&self) -> Duration {
        Duration::from_millis(self.replication_poll_interval_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set how many SSTables may accumulate before compaction
    pub fn max_sstables(mut self, count: usize) -> Self {
        self.config.max_sstables = count;
        self
    }

    /// Set the node role
    pub fn role(mut self, role: NodeRole) -> Self {
        self.config.role = role;
        self
    }

    /// Set the primary address replicas pull from
    pub fn primary_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.primary_addr = Some(addr.into());
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the inter-node request timeout (in milliseconds)
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set the replication poll interval (in milliseconds)
    pub fn replication_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.replication_poll_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

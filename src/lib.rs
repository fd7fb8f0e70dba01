//! # ShardKV
//!
//! A sharded key-value store with single-leader replication, served over
//! HTTP:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - A replication log written atomically with every primary write
//! - Deterministic key → shard routing with one-hop proxying
//! - Pull-based replicas that converge to their primary
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 HTTP Server (axum)                          │
//! │     /get /set /purge /health  /next-replication-key ...     │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ local key                        │ remote key
//!            ▼                                  ▼
//!   ┌─────────────────┐                 ┌───────────────┐
//!   │     Engine      │                 │  PeerClient   │──► owning shard
//!   │ (single writer) │                 │  (reqwest)    │
//!   └───┬────────┬────┘                 └───────▲───────┘
//!       │        │                              │
//!       ▼        ▼                              │
//!   ┌───────┐ ┌──────────┐             ┌────────┴────────┐
//!   │  WAL  │ │ MemTable │             │ ReplicationLoop │
//!   └───────┘ └────┬─────┘             │ (replicas only) │
//!                  ▼                   └─────────────────┘
//!            ┌──────────┐
//!            │ SSTables │
//!            └──────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod keyspace;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod sharding;
pub mod protocol;
pub mod network;
pub mod replication;
pub mod purge;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ShardKvError, Result};
pub use config::{Config, NodeRole};
pub use engine::{Engine, ReplicationLogEntry};
pub use sharding::ShardTable;
pub use network::Server;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ShardKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for ShardKV
//!
//! Provides a unified error type for all operations.
//!
//! The variants group into the kinds callers care about:
//! - not found: `KeyNotFound`
//! - storage fault: `Io`, `WalCorruption`, `WalWrite`, `Storage`, `Serialization`
//! - routing error: `Routing`
//! - write rejected: `WriteRejected`
//! - replication/proxy transport error: `Transport`, `Timeout`
//! - parse error: `Config`

use thiserror::Error;

/// Result type alias using ShardKvError
pub type Result<T> = std::result::Result<T, ShardKvError>;

/// Unified error type for ShardKV operations
#[derive(Debug, Error)]
pub enum ShardKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Routing Errors
    // -------------------------------------------------------------------------
    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShardKvError {
    /// True for failures of the underlying device or on-disk encoding
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            ShardKvError::Io(_)
                | ShardKvError::WalCorruption(_)
                | ShardKvError::WalWrite(_)
                | ShardKvError::Storage(_)
                | ShardKvError::Serialization(_)
        )
    }

    /// True for failures talking to a peer node
    pub fn is_transport(&self) -> bool {
        matches!(self, ShardKvError::Transport(_) | ShardKvError::Timeout(_))
    }
}

impl From<bincode::Error> for ShardKvError {
    fn from(e: bincode::Error) -> Self {
        ShardKvError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ShardKvError {
    fn from(e: serde_json::Error) -> Self {
        ShardKvError::Serialization(e.to_string())
    }
}

//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::sharding::ShardId;

/// `?key=` for `/get`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

/// `?key=&value=` for `/set`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetQuery {
    pub key: Option<String>,
    pub value: Option<String>,
}

/// `?sequence=` for `/delete-replication-key`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceQuery {
    pub sequence: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    /// Replication log sequence assigned by the primary
    pub sequence: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

/// A pending replication log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationEntryBody {
    pub sequence: u64,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub shard: ShardId,
    pub shard_count: usize,
    pub role: String,
    pub pending_replication: usize,
    pub version: String,
}

//! Purge
//!
//! After a reshard (edit the shard table, restart every node), each node
//! still holds the records it owned under the old table. Purge deletes the
//! ones the current table assigns elsewhere. Nothing is migrated.

use crate::engine::Engine;
use crate::error::Result;
use crate::sharding::ShardTable;

/// Delete every local record the shard table no longer assigns to this node
///
/// Returns the number of records removed. Deletes are local only and are
/// never written to the replication log.
pub fn purge_foreign_keys(engine: &Engine, shards: &ShardTable) -> Result<usize> {
    let mut purged = 0;

    for key in engine.list_local_keys_not_in(|key| shards.is_local(key))? {
        engine.delete(&key)?;
        purged += 1;
    }

    tracing::info!(
        shard = shards.current(),
        purged,
        "Purged records owned by other shards"
    );
    Ok(purged)
}

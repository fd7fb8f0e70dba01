//! Sharding Module
//!
//! Static mapping of keys to shards and of shards to node addresses.
//!
//! ## Routing Contract
//! Every node and client sharing a shard table must agree on
//!
//! ```text
//!   owner(key) = fnv1_64(key bytes) mod shard_count
//! ```
//!
//! where `fnv1_64` is 64-bit FNV-1 (multiply, then xor). Shard indexes are
//! exactly `0..shard_count`. The table is loaded once at startup and never
//! changes while the process runs; resharding means editing the config,
//! restarting the nodes and calling purge.

mod hash;
mod table;
mod file;

pub use hash::fnv1_64;
pub use table::{Destination, ShardId, ShardTable};
pub use file::{ShardEntry, ShardsConfig};

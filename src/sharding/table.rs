//! Shard table
//!
//! Immutable `shard id → address` mapping plus the identity of the local
//! shard.

use super::hash::fnv1_64;
use crate::error::{Result, ShardKvError};

pub type ShardId = u32;

/// Where a request for a key has to be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination<'a> {
    /// This process owns the key
    Local,

    /// Another shard's primary owns the key
    Remote { shard: ShardId, address: &'a str },
}

/// Routing table shared (read-only) by every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTable {
    /// Indexed by shard id
    addresses: Vec<String>,

    /// Shard served by this process
    current: ShardId,
}

impl ShardTable {
    /// Build a table from `(shard id, address)` pairs
    ///
    /// Fails with a configuration error if the table is empty, an id repeats,
    /// the ids are not exactly `0..N`, an address is malformed, or `current`
    /// is not in the table.
    pub fn load<I, S>(entries: I, current: ShardId) -> Result<Self>
    where
        I: IntoIterator<Item = (ShardId, S)>,
        S: Into<String>,
    {
        let entries: Vec<(ShardId, String)> = entries
            .into_iter()
            .map(|(id, address)| (id, address.into()))
            .collect();

        if entries.is_empty() {
            return Err(ShardKvError::Config("shard table is empty".to_string()));
        }

        // Ids are exactly 0..N, so N bounds every valid id
        let mut slots: Vec<Option<String>> = vec![None; entries.len()];

        for (id, address) in entries {
            validate_address(&address)?;

            let idx = id as usize;
            if idx >= slots.len() {
                return Err(ShardKvError::Config(format!(
                    "shard index {} is out of range for {} shards",
                    id,
                    slots.len()
                )));
            }
            if slots[idx].is_some() {
                return Err(ShardKvError::Config(format!("duplicate shard index {}", id)));
            }
            slots[idx] = Some(address);
        }

        let addresses = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| {
                    ShardKvError::Config(format!("shard {} is missing from the table", idx))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if current as usize >= addresses.len() {
            return Err(ShardKvError::Config(format!(
                "current shard {} is not in the table ({} shards)",
                current,
                addresses.len()
            )));
        }

        Ok(Self { addresses, current })
    }

    /// Shard that owns `key`
    pub fn owner(&self, key: &[u8]) -> ShardId {
        (fnv1_64(key) % self.addresses.len() as u64) as ShardId
    }

    /// True if `key` belongs to this process's shard
    pub fn is_local(&self, key: &[u8]) -> bool {
        self.owner(key) == self.current
    }

    /// Decide where a request for `key` is served
    ///
    /// Fails with a routing error if the owner has no address, which means
    /// the table itself is inconsistent.
    pub fn route(&self, key: &[u8]) -> Result<Destination<'_>> {
        let shard = self.owner(key);
        if shard == self.current {
            return Ok(Destination::Local);
        }
        let address = self.address_for(shard).ok_or_else(|| {
            ShardKvError::Routing(format!("no address for shard {}", shard))
        })?;
        Ok(Destination::Remote { shard, address })
    }

    /// Address of a shard's primary, if the shard exists
    pub fn address_for(&self, shard: ShardId) -> Option<&str> {
        self.addresses.get(shard as usize).map(String::as_str)
    }

    pub fn current(&self) -> ShardId {
        self.current
    }

    /// Address the table lists for the local shard
    pub fn local_address(&self) -> &str {
        &self.addresses[self.current as usize]
    }

    pub fn count(&self) -> usize {
        self.addresses.len()
    }

    /// `(shard id, address)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (ShardId, &str)> {
        self.addresses
            .iter()
            .enumerate()
            .map(|(idx, addr)| (idx as ShardId, addr.as_str()))
    }
}

/// Accepts `host:port` with a non-empty host and a valid port
pub(crate) fn validate_address(address: &str) -> Result<()> {
    let malformed = || ShardKvError::Config(format!("malformed address {:?}", address));

    let (host, port) = address.rsplit_once(':').ok_or_else(malformed)?;
    if host.is_empty() || host.contains('/') || host.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(malformed()),
    }
}

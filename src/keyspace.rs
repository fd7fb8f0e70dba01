//! Internal keyspace layout
//!
//! User records, the replication log and engine metadata share one ordered
//! keyspace, so a single WAL entry can cover all three.
//!
//! ```text
//!   d/<user key>                 → value
//!   r/<sequence, u64 big-endian> → user key
//!   m/next_sequence              → u64 big-endian
//! ```
//!
//! Big-endian sequences sort numerically, so the smallest pending log entry
//! is the first key under `r/`.

use crate::error::{Result, ShardKvError};

pub const DATA_PREFIX: &[u8] = b"d/";
pub const LOG_PREFIX: &[u8] = b"r/";
pub const NEXT_SEQUENCE_KEY: &[u8] = b"m/next_sequence";

pub fn data_key(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(DATA_PREFIX.len() + key.len());
    out.extend_from_slice(DATA_PREFIX);
    out.extend_from_slice(key);
    out
}

/// Strip the data prefix from an internal key
pub fn user_key(internal: &[u8]) -> Option<&[u8]> {
    internal.strip_prefix(DATA_PREFIX)
}

pub fn log_key(sequence: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(LOG_PREFIX.len() + 8);
    out.extend_from_slice(LOG_PREFIX);
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

/// Sequence number of an internal log key
pub fn log_sequence(internal: &[u8]) -> Option<u64> {
    let raw = internal.strip_prefix(LOG_PREFIX)?;
    let bytes: [u8; 8] = raw.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

pub fn encode_sequence(sequence: u64) -> Vec<u8> {
    sequence.to_be_bytes().to_vec()
}

pub fn decode_sequence(raw: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        ShardKvError::Storage(format!("sequence counter has {} bytes, expected 8", raw.len()))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

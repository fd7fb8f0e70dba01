//! Storage Module
//!
//! Persistent storage layer using SSTable files.
//!
//! ## Responsibilities
//! - Persist flushed memtables to disk in sorted format
//! - Point lookups newest → oldest
//! - Ordered prefix scans merged across tables
//! - Full compaction once too many tables pile up

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::{StorageManager, COMPACTION_MARKER};

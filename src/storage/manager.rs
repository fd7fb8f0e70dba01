//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Merge prefix scans across SSTables
//! - Create new SSTables from MemTable flushes
//! - Merge every SSTable into one on compaction

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, ShardKvError};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

const TMP_SUFFIX: &str = "tmp";

/// Present while a compaction is removing the tables it merged.
///
/// Holds the lowest SSTable ID that survives; every table below it was
/// merged into a newer one.
pub const COMPACTION_MARKER: &str = "COMPACTION";

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove half-written tables left by a crash
    /// 3. Finish an interrupted compaction
    /// 4. Open readers for each SSTable (loads indexes into RAM)
    /// 5. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let marker = path.join(COMPACTION_MARKER);
        let first_live_id = if marker.exists() {
            let text = fs::read_to_string(&marker)?;
            let id = text.trim().parse::<u64>().map_err(|_| {
                ShardKvError::Storage(format!("malformed compaction marker {:?}", text))
            })?;
            Some(id)
        } else {
            None
        };

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }

            if file_path.extension().is_some_and(|ext| ext == TMP_SUFFIX) {
                tracing::warn!(path = %file_path.display(), "Removing incomplete SSTable");
                fs::remove_file(&file_path)?;
                continue;
            }

            if let Some(id) = Self::parse_sstable_id(&file_path) {
                if first_live_id.is_some_and(|first| id < first) {
                    tracing::warn!(path = %file_path.display(), "Removing compacted SSTable");
                    fs::remove_file(&file_path)?;
                    continue;
                }
                sstable_ids.push(id);
            }
        }

        if first_live_id.is_some() {
            fs::remove_file(&marker)?;
        }

        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            sstables.push(SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %path.display(),
            sstables = sstables.len(),
            "Storage manager opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or found tombstone (deleted)
    ///
    /// Takes the write lock because `SSTableReader::get` moves the file cursor.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }

            match reader.get(key) {
                Ok(value) => return Ok(value),
                Err(ShardKvError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Merged view of every key starting with `prefix`
    ///
    /// Newer tables win; tombstones are kept as `None` so the caller can
    /// overlay the memtable and drop them.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
        let mut sstables = self.sstables.write();
        let mut merged = BTreeMap::new();

        for reader in sstables.iter_mut().rev() {
            for (key, value) in reader.scan_prefix(prefix)? {
                merged.insert(key, value);
            }
        }

        Ok(merged)
    }

    /// Like `scan_prefix`, but only whether each key is live
    pub fn scan_prefix_keys(&self, prefix: &[u8]) -> Result<BTreeMap<Vec<u8>, bool>> {
        let mut sstables = self.sstables.write();
        let mut merged = BTreeMap::new();

        for reader in sstables.iter_mut().rev() {
            for (key, live) in reader.scan_prefix_keys(prefix)? {
                merged.insert(key, live);
            }
        }

        Ok(merged)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// The table is written under a temporary name and renamed once complete,
    /// then placed at the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(ShardKvError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let metadata = self.write_table(
            id,
            memtable.iter().map(|(key, entry)| match entry {
                MemTableEntry::Value(v) => (key, Some(v)),
                MemTableEntry::Tombstone => (key, None),
            }),
        )?;

        let reader = SSTableReader::open(&metadata.path)?;
        self.sstables.write().insert(0, reader);

        tracing::debug!(id, entries = metadata.entry_count, "Flushed memtable to SSTable");
        Ok(metadata)
    }

    /// Merge every SSTable into one, dropping tombstones
    ///
    /// Dropping tombstones is only safe because every table takes part, so
    /// the old tables must never outlive the merge partially. A marker naming
    /// the first surviving ID is made durable before anything is removed and
    /// `open` finishes the removal after a crash. Old tables go oldest first.
    /// Returns the number of tables that were merged.
    pub fn compact(&self) -> Result<usize> {
        let mut sstables = self.sstables.write();
        let merged_count = sstables.len();
        if merged_count <= 1 {
            return Ok(0);
        }

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for reader in sstables.iter_mut().rev() {
            for entry in reader.iter()? {
                let (key, value) = entry?;
                merged.insert(key, value);
            }
        }

        let live: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();

        let first_live_id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let mut replacement = Vec::new();
        if !live.is_empty() {
            let metadata =
                self.write_table(first_live_id, live.into_iter().map(|(k, v)| (k, Some(v))))?;
            replacement.push(SSTableReader::open(&metadata.path)?);
        }

        self.write_marker(first_live_id)?;

        // Newest first in memory, so reverse for oldest-first removal
        let old: Vec<PathBuf> = sstables.iter().rev().map(|r| r.path().to_path_buf()).collect();
        *sstables = replacement;
        for path in old {
            fs::remove_file(&path)?;
        }
        fs::remove_file(self.data_dir.join(COMPACTION_MARKER))?;

        tracing::info!(merged = merged_count, remaining = sstables.len(), "Compacted SSTables");
        Ok(merged_count)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_table(
        &self,
        id: u64,
        entries: impl Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
    ) -> Result<SSTable> {
        let final_path = Self::sstable_path_with_dir(&self.data_dir, id);
        let tmp_path = final_path.with_extension(format!("sst.{}", TMP_SUFFIX));

        let mut builder = SSTableBuilder::new(&tmp_path)?;
        for (key, value) in entries {
            builder.add_entry(&key, value.as_deref())?;
        }
        let mut metadata = builder.finish()?;

        fs::rename(&tmp_path, &final_path)?;
        metadata.path = final_path;
        Ok(metadata)
    }

    fn write_marker(&self, first_live_id: u64) -> Result<()> {
        let final_path = self.data_dir.join(COMPACTION_MARKER);
        let tmp_path = final_path.with_extension(TMP_SUFFIX);

        let mut file = File::create(&tmp_path)?;
        file.write_all(first_live_id.to_string().as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Generate SSTable path given a directory and ID
    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}

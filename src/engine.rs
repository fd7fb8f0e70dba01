//! Engine Module
//!
//! The storage engine: durable key-value records plus the replication log.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Append a replication log entry with every primary write, atomically
//! - Handle concurrent read/write access
//! - Trigger flushes and compactions
//! - Manage crash recovery on startup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::{Config, NodeRole};
use crate::error::{Result, ShardKvError};
use crate::keyspace;
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// A pending change the replicas have not acknowledged yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationLogEntry {
    pub sequence: u64,
    pub key: Vec<u8>,
}

/// State only touched while holding the write lock
struct WriteState {
    /// Sequence the next logged write receives
    next_sequence: u64,
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/delete/ack/flush): serialized by `write_state`.
///   One commit = one WAL entry, applied to the memtable afterwards.
/// - **Reads** (get, next replication entry): never take `write_state`.
///   The memtable and the pending index have their own RwLocks.
pub struct Engine {
    config: Config,

    /// Directory for SSTables
    storage_dir: PathBuf,

    wal: Mutex<WalWriter>,

    memtable: MemTable,

    storage: StorageManager,

    /// Serializes write operations and owns the sequence counter
    write_state: Mutex<WriteState>,

    /// Pending replication entries, sequence → user key
    pending: RwLock<BTreeMap<u64, Vec<u8>>>,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL, flush what it held and truncate it
    /// 4. Rebuild the pending replication index and sequence counter
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery finished"
                );
            }

            for entry in entries {
                Self::apply_to_memtable(&memtable, entry.operations);
            }

            if !memtable.is_empty() {
                tracing::debug!(
                    entries = memtable.entry_count(),
                    "Flushing recovered entries to SSTable"
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        // Everything the WAL held is durable in SSTables now
        wal.truncate()?;

        let pending = Self::load_pending(&storage)?;
        let stored_next = match storage.get(keyspace::NEXT_SEQUENCE_KEY)? {
            Some(raw) => keyspace::decode_sequence(&raw)?,
            None => 1,
        };
        let next_sequence = pending
            .keys()
            .next_back()
            .map(|last| last + 1)
            .unwrap_or(1)
            .max(stored_next);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            role = %config.role,
            pending = pending.len(),
            next_sequence,
            sstables = storage.sstable_count(),
            "Engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_state: Mutex::new(WriteState { next_sequence }),
            pending: RwLock::new(pending),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_internal(&keyspace::data_key(key))
    }

    /// Store a record
    ///
    /// On a primary the same commit appends a replication log entry and
    /// advances the persisted sequence counter; the assigned sequence is
    /// returned. A replica only stores the record and returns `None`.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<Option<u64>> {
        let mut state = self.write_state.lock();

        let mut ops = vec![Operation::Put {
            key: keyspace::data_key(key),
            value: value.to_vec(),
        }];

        let sequence = match self.config.role {
            NodeRole::Primary => {
                let sequence = state.next_sequence;
                ops.push(Operation::Put {
                    key: keyspace::log_key(sequence),
                    value: key.to_vec(),
                });
                ops.push(Operation::Put {
                    key: keyspace::NEXT_SEQUENCE_KEY.to_vec(),
                    value: keyspace::encode_sequence(sequence + 1),
                });
                Some(sequence)
            }
            NodeRole::Replica => None,
        };

        self.commit(ops)?;

        if let Some(sequence) = sequence {
            state.next_sequence = sequence + 1;
            self.pending.write().insert(sequence, key.to_vec());
        }

        self.maybe_flush()?;
        Ok(sequence)
    }

    /// Remove a record without touching the replication log
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _state = self.write_state.lock();
        self.commit(vec![Operation::Delete {
            key: keyspace::data_key(key),
        }])?;
        self.maybe_flush()
    }

    /// Keys stored here for which `belongs_here` returns false
    ///
    /// The key set is snapshotted when called; the predicate runs lazily as
    /// the iterator is consumed. Call again after deleting to see the new
    /// state.
    pub fn list_local_keys_not_in<F>(&self, belongs_here: F) -> Result<impl Iterator<Item = Vec<u8>>>
    where
        F: Fn(&[u8]) -> bool,
    {
        let snapshot = {
            // Holding the write lock keeps a flush from moving entries
            // between the two halves of the scan
            let _state = self.write_state.lock();
            let mut merged = self.storage.scan_prefix_keys(keyspace::DATA_PREFIX)?;
            merged.extend(self.memtable.scan_prefix_keys(keyspace::DATA_PREFIX));
            merged
        };

        Ok(snapshot
            .into_iter()
            .filter(|(_, live)| *live)
            .filter_map(|(internal, _)| keyspace::user_key(&internal).map(<[u8]>::to_vec))
            .filter(move |key| !belongs_here(key.as_slice())))
    }

    // =========================================================================
    // Replication Log
    // =========================================================================

    /// The pending entry with the smallest sequence, if any
    pub fn next_replication_entry(&self) -> Option<ReplicationLogEntry> {
        self.pending
            .read()
            .first_key_value()
            .map(|(&sequence, key)| ReplicationLogEntry {
                sequence,
                key: key.clone(),
            })
    }

    /// Delete the log entry with this sequence
    ///
    /// Fails with `KeyNotFound` if it is not pending (already acknowledged
    /// or never issued). The record itself is untouched.
    pub fn ack_replication_entry(&self, sequence: u64) -> Result<()> {
        let _state = self.write_state.lock();

        if !self.pending.read().contains_key(&sequence) {
            return Err(ShardKvError::KeyNotFound);
        }

        self.commit(vec![Operation::Delete {
            key: keyspace::log_key(sequence),
        }])?;
        self.pending.write().remove(&sequence);

        self.maybe_flush()
    }

    /// Number of entries waiting for acknowledgement
    pub fn pending_replication_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Sequence the next logged write will receive
    pub fn next_sequence(&self) -> u64 {
        self.write_state.lock().next_sequence
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Flush memtable to disk
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _state = self.write_state.lock();
        self.flush_internal()
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs the WAL. The engine stays usable,
    /// so this can be called through a shared handle.
    pub fn close(&self) -> Result<()> {
        let _state = self.write_state.lock();
        self.flush_internal()?;
        self.wal.lock().sync()?;
        tracing::info!(data_dir = %self.config.data_dir.display(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn role(&self) -> NodeRole {
        self.config.role
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn get_internal(&self, internal: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(internal) {
            return Ok(entry.into_value());
        }
        self.storage.get(internal)
    }

    /// Log then apply one atomic group of operations
    ///
    /// Caller holds `write_state`.
    fn commit(&self, ops: Vec<Operation>) -> Result<()> {
        self.wal.lock().append_batch(ops.clone())?;
        Self::apply_to_memtable(&self.memtable, ops);
        Ok(())
    }

    fn apply_to_memtable(memtable: &MemTable, ops: Vec<Operation>) {
        for op in ops {
            match op {
                Operation::Put { key, value } => {
                    memtable.put(key, value);
                }
                Operation::Delete { key } => {
                    memtable.delete(key);
                }
            }
        }
    }

    /// Caller holds `write_state`.
    fn maybe_flush(&self) -> Result<()> {
        if self.memtable.should_flush(self.config.memtable_size_limit) {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Caller holds `write_state`.
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;

        if self.storage.sstable_count() > self.config.max_sstables {
            self.storage.compact()?;
        }

        Ok(())
    }

    fn load_pending(storage: &StorageManager) -> Result<BTreeMap<u64, Vec<u8>>> {
        let mut pending = BTreeMap::new();
        for (internal, value) in storage.scan_prefix(keyspace::LOG_PREFIX)? {
            let Some(value) = value else { continue };
            match keyspace::log_sequence(&internal) {
                Some(sequence) => {
                    pending.insert(sequence, value);
                }
                None => {
                    return Err(ShardKvError::Storage(format!(
                        "malformed replication log key {:?}",
                        internal
                    )));
                }
            }
        }
        Ok(pending)
    }
}


//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{Operation, WalEntry, WalRecovery};
use crate::config::WalSyncStrategy;
use crate::error::{Result, ShardKvError};

/// What the writer needs from the underlying file
trait LogFile: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// A frame that could not be written
#[derive(Debug)]
struct FrameError {
    cause: io::Error,
    /// The file was cut back to where the frame started
    rolled_back: bool,
}

/// Write a whole frame or leave the file as it was
///
/// A frame left half written would swallow every frame appended after it
/// during recovery.
fn write_frame<F: LogFile>(file: &mut F, frame: &[u8]) -> std::result::Result<(), FrameError> {
    let start = file.stream_position().map_err(|cause| FrameError {
        cause,
        rolled_back: true,
    })?;

    file.write_all(frame).map_err(|cause| {
        let rolled_back = rollback(file, start).is_ok();
        FrameError { cause, rolled_back }
    })
}

fn rollback<F: LogFile>(file: &mut F, start: u64) -> io::Result<()> {
    file.truncate_to(start)?;
    file.seek(SeekFrom::Start(start))?;
    Ok(())
}

/// Writes entries to the WAL file
pub struct WalWriter {
    file: File,
    path: PathBuf,

    /// LSN the next append receives
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries written since the last fsync
    uncommitted: usize,

    /// A failed append could not be undone; refuse appends until truncated
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned first: a damaged tail is cut off and LSNs
    /// continue after the last valid entry.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            let (_, result) = WalRecovery::recover(path)?;
            result.last_lsn + 1
        } else {
            1
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_lsn,
            sync_strategy,
            uncommitted: 0,
            poisoned: false,
        })
    }

    /// Append a single operation as its own entry
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        self.append_batch(vec![operation])
    }

    /// Append several operations as one atomic entry
    ///
    /// Returns the LSN assigned to the entry. On failure nothing of the
    /// entry is left in the file.
    pub fn append_batch(&mut self, operations: Vec<Operation>) -> Result<u64> {
        if self.poisoned {
            return Err(ShardKvError::WalWrite(
                "WAL holds a partial entry that could not be removed".to_string(),
            ));
        }

        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, operations).serialize()?;

        if let Err(e) = write_frame(&mut self.file, &frame) {
            return Err(self.fail(lsn, e));
        }

        let should_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted + 1 >= count,
        };
        if should_sync {
            if let Err(cause) = self.file.sync_data() {
                let start = self.file.stream_position()? - frame.len() as u64;
                let rolled_back = rollback(&mut self.file, start).is_ok();
                return Err(self.fail(lsn, FrameError { cause, rolled_back }));
            }
            self.uncommitted = 0;
        } else {
            self.uncommitted += 1;
        }

        self.next_lsn += 1;
        Ok(lsn)
    }

    fn fail(&mut self, lsn: u64, err: FrameError) -> ShardKvError {
        if !err.rolled_back {
            self.poisoned = true;
        }
        tracing::error!(
            lsn,
            rolled_back = err.rolled_back,
            "WAL append failed: {}",
            err.cause
        );
        ShardKvError::WalWrite(err.cause.to_string())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard every entry (their contents are durable elsewhere)
    ///
    /// LSNs keep increasing after a truncate.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.uncommitted = 0;
        self.poisoned = false;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries appended since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

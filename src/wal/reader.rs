//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::entry::parse_header;
use super::{WalEntry, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::{Result, ShardKvError};

/// Outcome of reading one frame
#[derive(Debug)]
pub enum Frame {
    /// A complete, checksummed entry
    Entry(WalEntry),

    /// Clean end of file
    End,

    /// The file ends in the middle of a frame (crash during append)
    TornTail,

    /// A complete frame whose contents do not check out
    Corrupted(String),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last frame that decoded successfully
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Offset just past the last valid frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame, classifying what was found
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(Frame::End),
            n if n < HEADER_SIZE => return Ok(Frame::TornTail),
            _ => {}
        }

        let (lsn, crc, len) = parse_header(&header);
        if len > MAX_PAYLOAD_SIZE {
            return Ok(Frame::Corrupted(format!(
                "frame at offset {} declares {} byte payload",
                self.position, len
            )));
        }

        let mut payload = vec![0u8; len as usize];
        if read_full(&mut self.reader, &mut payload)? < payload.len() {
            return Ok(Frame::TornTail);
        }

        match WalEntry::from_parts(lsn, crc, &payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + payload.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(ShardKvError::WalCorruption(msg)) => Ok(Frame::Corrupted(msg)),
            Err(e) => Err(e),
        }
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at the end of the file or at a torn tail, and an
    /// error for a corrupted frame.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End | Frame::TornTail => Ok(None),
            Frame::Corrupted(msg) => Err(ShardKvError::WalCorruption(msg)),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Like `read_exact`, but reports how many bytes were available instead of
/// failing on a short read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

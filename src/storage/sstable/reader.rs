//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Result, ShardKvError};

use super::iterator::SSTableIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    file: BufReader<File>,

    /// key → file offset
    index: BTreeMap<Vec<u8>, u64>,

    entry_count: u64,

    /// Start of the index block (end of data)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data checksum, then loads the whole index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(path, format!("file too small ({} bytes)", file_size)));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(corrupt(path, format!("bad magic {:?}", &header[0..4])));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(corrupt(path, format!("unsupported version {}", version)));
        }
        let entry_count = u64::from_le_bytes(to_array(&header[6..14]));

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = u64::from_le_bytes(to_array(&footer[0..8]));
        let data_crc = u32::from_le_bytes(to_array(&footer[8..12]));

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(corrupt(path, format!("index offset {} out of range", index_offset)));
        }

        // Data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        if crc32fast::hash(&data) != data_crc {
            return Err(corrupt(path, "data checksum mismatch".to_string()));
        }
        drop(data);

        // Index block: [key_len(4)][offset(8)][key]
        let mut index_data = vec![0u8; (file_size - FOOTER_SIZE - index_offset) as usize];
        file.read_exact(&mut index_data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(corrupt(path, "truncated index entry".to_string()));
            }
            let key_len = u32::from_le_bytes(to_array(&index_data[pos..pos + 4])) as usize;
            let offset = u64::from_le_bytes(to_array(&index_data[pos + 4..pos + 12]));
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(corrupt(path, "truncated index key".to_string()));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(corrupt(
                path,
                format!("header says {} entries, index has {}", entry_count, index.len()),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(ShardKvError::KeyNotFound),
        };
        self.read_value_at(offset)
    }

    /// (key length, value length) of the entry at `offset`
    fn read_header_at(&mut self, offset: u64) -> Result<(u32, u32)> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = u32::from_le_bytes(to_array(&header[0..4]));
        let val_len = u32::from_le_bytes(to_array(&header[4..8]));
        Ok((key_len, val_len))
    }

    fn read_value_at(&mut self, offset: u64) -> Result<Option<Vec<u8>>> {
        let (key_len, val_len) = self.read_header_at(offset)?;
        self.file.seek_relative(key_len as i64)?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(None);
        }

        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        Ok(Some(value))
    }

    /// Every entry whose key starts with `prefix`, in key order
    /// (`None` value = tombstone)
    pub fn scan_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>> {
        let hits: Vec<(Vec<u8>, u64)> = self
            .index
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, off)| (k.clone(), *off))
            .collect();

        let mut out = Vec::with_capacity(hits.len());
        for (key, offset) in hits {
            let value = self.read_value_at(offset)?;
            out.push((key, value));
        }
        Ok(out)
    }

    /// Keys starting with `prefix` and whether each is live
    ///
    /// Reads entry headers only, never values.
    pub fn scan_prefix_keys(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, bool)>> {
        let hits: Vec<(Vec<u8>, u64)> = self
            .index
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, off)| (k.clone(), *off))
            .collect();

        let mut out = Vec::with_capacity(hits.len());
        for (key, offset) in hits {
            let (_, val_len) = self.read_header_at(offset)?;
            out.push((key, val_len != TOMBSTONE_MARKER));
        }
        Ok(out)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// False only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Iterate over all entries (compaction, debugging)
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }
}

fn corrupt(path: &Path, detail: String) -> ShardKvError {
    ShardKvError::Storage(format!("SSTable {} is invalid: {}", path.display(), detail))
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

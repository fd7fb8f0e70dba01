//! Tests for WAL Reader
//!
//! These tests verify:
//! - Sequential reads and iteration
//! - Frame classification (end, torn tail, corruption)
//! - Position tracking

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use shardkv::config::WalSyncStrategy;
use shardkv::wal::{Frame, Operation, WalReader, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

fn setup_wal(count: usize) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
    (temp_dir, wal_path)
}

fn append_bytes(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

#[test]
fn test_read_empty_file() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("empty.wal");
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(reader.read_frame().unwrap(), Frame::End));
    assert_eq!(reader.next_entry().unwrap(), None);
}

#[test]
fn test_next_entry_in_order() {
    let (_temp, wal_path) = setup_wal(3);
    let mut reader = WalReader::open(&wal_path).unwrap();

    for lsn in 1..=3 {
        assert_eq!(reader.next_entry().unwrap().unwrap().lsn, lsn);
    }
    assert_eq!(reader.next_entry().unwrap(), None);
}

#[test]
fn test_iterator_collects_all() {
    let (_temp, wal_path) = setup_wal(10);

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(entries.len(), 10);
    assert_eq!(entries[9].lsn, 10);
}

#[test]
fn test_position_tracks_valid_frames() {
    let (_temp, wal_path) = setup_wal(2);
    let file_len = std::fs::metadata(&wal_path).unwrap().len();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.position(), 0);
    reader.next_entry().unwrap();
    reader.next_entry().unwrap();
    assert_eq!(reader.position(), file_len);
}

#[test]
fn test_torn_header() {
    let (_temp, wal_path) = setup_wal(1);
    let valid_len = std::fs::metadata(&wal_path).unwrap().len();
    append_bytes(&wal_path, &[0u8; HEADER_SIZE / 2]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(reader.read_frame().unwrap(), Frame::Entry(_)));
    assert!(matches!(reader.read_frame().unwrap(), Frame::TornTail));
    assert_eq!(reader.position(), valid_len);
}

#[test]
fn test_torn_payload() {
    let (_temp, wal_path) = setup_wal(1);

    // Header promising 100 bytes, followed by only 10
    let mut partial = Vec::new();
    partial.extend_from_slice(&2u64.to_le_bytes());
    partial.extend_from_slice(&0u32.to_le_bytes());
    partial.extend_from_slice(&100u32.to_le_bytes());
    partial.extend_from_slice(&[0xAA; 10]);
    append_bytes(&wal_path, &partial);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert_eq!(reader.next_entry().unwrap(), None);
}

#[test]
fn test_corrupted_frame_is_error() {
    let (_temp, wal_path) = setup_wal(2);

    // Flip the last byte of the second frame's payload
    let mut bytes = std::fs::read(&wal_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&wal_path, &bytes).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().is_err());

    // The iterator yields the error once and stops
    let results: Vec<_> = WalReader::open(&wal_path).unwrap().entries().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

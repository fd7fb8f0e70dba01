//! Tests for WAL Writer
//!
//! These tests verify:
//! - LSN assignment and continuation across reopen
//! - Batch appends land as a single entry
//! - Sync strategies
//! - Truncation

use std::path::PathBuf;

use shardkv::config::WalSyncStrategy;
use shardkv::wal::{Operation, WalReader, WalWriter};
use tempfile::TempDir;

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(i: usize) -> Operation {
    Operation::Put {
        key: format!("key{}", i).into_bytes(),
        value: format!("value{}", i).into_bytes(),
    }
}

fn read_all(path: &PathBuf) -> Vec<shardkv::wal::WalEntry> {
    WalReader::open(path)
        .unwrap()
        .entries()
        .collect::<shardkv::Result<Vec<_>>>()
        .unwrap()
}

#[test]
fn test_open_creates_file() {
    let (_temp, wal_path) = setup_temp_wal();

    let writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert!(wal_path.exists());
    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.path(), wal_path.as_path());
}

#[test]
fn test_append_assigns_increasing_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.append(put(0)).unwrap(), 1);
    assert_eq!(writer.append(put(1)).unwrap(), 2);
    assert_eq!(writer.append_batch(vec![put(2), put(3)]).unwrap(), 3);
    assert_eq!(writer.current_lsn(), 4);
}

#[test]
fn test_batch_is_one_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append_batch(vec![put(0), put(1), put(2)]).unwrap();
    }

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operations, vec![put(0), put(1), put(2)]);
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        for i in 0..5 {
            writer.append(put(i)).unwrap();
        }
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 6);
    writer.append(put(5)).unwrap();
    drop(writer);

    let lsns: Vec<u64> = read_all(&wal_path).iter().map(|e| e.lsn).collect();
    assert_eq!(lsns, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_sync_every_write() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put(0)).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_sync_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(put(0)).unwrap();
    writer.append(put(1)).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(put(2)).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);

    writer.append(put(3)).unwrap();
    writer.sync().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_truncate_keeps_lsn_increasing() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put(0)).unwrap();
    writer.append(put(1)).unwrap();
    writer.truncate().unwrap();

    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(put(2)).unwrap(), 3);
    drop(writer);

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

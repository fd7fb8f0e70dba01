//! Tests for SSTable implementation
//!
//! These tests verify:
//! - SSTable creation and lookups via the in-memory index
//! - Tombstone handling
//! - Prefix scans and full iteration
//! - Min/max key range filtering
//! - File format validation

use std::path::PathBuf;

use shardkv::storage::{SSTable, SSTableBuilder, SSTableReader};
use shardkv::ShardKvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.sst");
    (temp_dir, path)
}

/// Create an SSTable with numbered entries
fn create_sstable_with_entries(path: &PathBuf, count: usize) -> SSTable {
    let mut builder = SSTableBuilder::new(path).unwrap();
    // Keys must be added in sorted order
    for i in 0..count {
        let key = format!("key{:04}", i);
        let value = format!("value{}", i);
        builder.add(key.as_bytes(), value.as_bytes()).unwrap();
    }
    builder.finish().unwrap()
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder_summary() {
    let (_temp, path) = setup_temp_sstable();

    let table = create_sstable_with_entries(&path, 10);

    assert_eq!(table.entry_count(), 10);
    assert_eq!(table.min_key, b"key0000".to_vec());
    assert_eq!(table.max_key, b"key0009".to_vec());
    assert_eq!(table.file_size, std::fs::metadata(&path).unwrap().len());
    assert!(table.might_contain(b"key0005"));
    assert!(!table.might_contain(b"zzz"));
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();

    builder.add(b"b", b"1").unwrap();
    assert!(matches!(builder.add(b"a", b"2"), Err(ShardKvError::Storage(_))));
    assert!(builder.add(b"b", b"3").is_err()); // Duplicates too
}

#[test]
fn test_empty_table() {
    let (_temp, path) = setup_temp_sstable();

    let table = SSTableBuilder::new(&path).unwrap().finish().unwrap();
    assert_eq!(table.entry_count(), 0);
    assert!(!table.might_contain(b""));

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.entry_count(), 0);
    assert_eq!(reader.min_key(), None);
    assert_eq!(reader.iter().unwrap().count(), 0);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_get() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 100);

    let mut reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.entry_count(), 100);
    assert_eq!(reader.get(b"key0000").unwrap(), Some(b"value0".to_vec()));
    assert_eq!(reader.get(b"key0057").unwrap(), Some(b"value57".to_vec()));
    assert_eq!(reader.get(b"key0099").unwrap(), Some(b"value99".to_vec()));
}

#[test]
fn test_reader_get_missing_key() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 10);

    let mut reader = SSTableReader::open(&path).unwrap();

    assert!(matches!(reader.get(b"key0100"), Err(ShardKvError::KeyNotFound)));
    assert!(matches!(reader.get(b"aaa"), Err(ShardKvError::KeyNotFound)));
}

#[test]
fn test_reader_tombstone() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"alive", b"yes").unwrap();
    builder.add_tombstone(b"dead").unwrap();
    builder.finish().unwrap();

    let mut reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.get(b"alive").unwrap(), Some(b"yes".to_vec()));
    // Found, but deleted
    assert_eq!(reader.get(b"dead").unwrap(), None);
}

#[test]
fn test_reader_min_max() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 5);

    let reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.min_key(), Some(&b"key0000"[..]));
    assert_eq!(reader.max_key(), Some(&b"key0004"[..]));
    assert!(reader.might_contain(b"key0002"));
    assert!(!reader.might_contain(b"key0005"));
    assert_eq!(reader.path(), path.as_path());
}

#[test]
fn test_reader_scan_prefix() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"d/a", b"1").unwrap();
    builder.add_tombstone(b"d/b").unwrap();
    builder.add(b"m/next_sequence", b"\0\0\0\0\0\0\0\x02").unwrap();
    builder.add(b"r/\0\0\0\0\0\0\0\x01", b"a").unwrap();
    builder.finish().unwrap();

    let mut reader = SSTableReader::open(&path).unwrap();

    assert_eq!(
        reader.scan_prefix(b"d/").unwrap(),
        vec![(b"d/a".to_vec(), Some(b"1".to_vec())), (b"d/b".to_vec(), None)]
    );
    assert_eq!(reader.scan_prefix(b"r/").unwrap().len(), 1);
    assert!(reader.scan_prefix(b"z/").unwrap().is_empty());

    assert_eq!(
        reader.scan_prefix_keys(b"d/").unwrap(),
        vec![(b"d/a".to_vec(), true), (b"d/b".to_vec(), false)]
    );
    // Header reads leave the reader usable for lookups
    assert_eq!(reader.get(b"d/a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_reader_iter_in_order() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 50);

    let mut reader = SSTableReader::open(&path).unwrap();
    let entries: Vec<_> = reader.iter().unwrap().map(|e| e.unwrap()).collect();

    assert_eq!(entries.len(), 50);
    for (i, (key, value)) in entries.iter().enumerate() {
        assert_eq!(key, format!("key{:04}", i).as_bytes());
        assert_eq!(value.as_deref(), Some(format!("value{}", i).as_bytes()));
    }

    // Lookups still work after iterating
    assert_eq!(reader.get(b"key0010").unwrap(), Some(b"value10".to_vec()));
}

// =============================================================================
// Format Validation Tests
// =============================================================================

#[test]
fn test_open_rejects_bad_magic() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 3);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = b'X';
    std::fs::write(&path, &bytes).unwrap();

    assert!(SSTableReader::open(&path).is_err());
}

#[test]
fn test_open_rejects_corrupted_data() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 3);

    // Flip a byte inside the first value
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[14 + 8 + 7] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    assert!(SSTableReader::open(&path).is_err());
}

#[test]
fn test_open_rejects_truncated_file() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable_with_entries(&path, 3);

    std::fs::write(&path, b"SHKV").unwrap();

    assert!(SSTableReader::open(&path).is_err());
}

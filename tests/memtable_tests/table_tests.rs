//! MemTable Tests
//!
//! Tests verify:
//! - Basic put/get/delete and tombstones
//! - Size tracking and the flush trigger
//! - Sorted snapshots and prefix scans over internal namespaces
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use shardkv::memtable::{MemTable, MemTableEntry};

fn value(bytes: &[u8]) -> Option<MemTableEntry> {
    Some(MemTableEntry::Value(bytes.to_vec()))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
    assert_eq!(memtable.get(b"missing"), None);
}

#[test]
fn test_put_get_overwrite() {
    let memtable = MemTable::new();

    memtable.put(b"d/key".to_vec(), b"value1".to_vec());
    assert_eq!(memtable.get(b"d/key"), value(b"value1"));

    memtable.put(b"d/key".to_vec(), b"value2".to_vec());
    assert_eq!(memtable.get(b"d/key"), value(b"value2"));
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_delete_leaves_tombstone() {
    let memtable = MemTable::new();

    memtable.put(b"d/key".to_vec(), b"value".to_vec());
    memtable.delete(b"d/key".to_vec());
    memtable.delete(b"d/never-written".to_vec());

    assert_eq!(memtable.get(b"d/key"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.get(b"d/never-written"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.entry_count(), 2);

    memtable.put(b"d/key".to_vec(), b"back".to_vec());
    assert_eq!(memtable.get(b"d/key"), value(b"back"));
}

#[test]
fn test_into_value() {
    assert_eq!(MemTableEntry::Value(b"v".to_vec()).into_value(), Some(b"v".to_vec()));
    assert_eq!(MemTableEntry::Tombstone.into_value(), None);
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_put_returns_running_size() {
    let memtable = MemTable::new();

    assert_eq!(memtable.put(b"key1".to_vec(), b"value1".to_vec()), 10);
    assert_eq!(memtable.put(b"key2".to_vec(), b"v".to_vec()), 15);
    assert_eq!(memtable.size(), 15);
}

#[test]
fn test_size_tracking_overwrite_counts_key_once() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"short".to_vec());
    memtable.put(b"key".to_vec(), b"much_longer_value".to_vec());
    assert_eq!(memtable.size(), b"key".len() + b"much_longer_value".len());

    memtable.put(b"key".to_vec(), b"s".to_vec());
    assert_eq!(memtable.size(), b"key".len() + 1);
}

#[test]
fn test_size_tracking_delete() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"value".to_vec());
    let size_after_delete = memtable.delete(b"key".to_vec());

    // Tombstone = just key
    assert_eq!(size_after_delete, b"key".len());
}

#[test]
fn test_should_flush() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"value".to_vec());
    let size = memtable.size();

    assert!(!memtable.should_flush(size + 1));
    assert!(memtable.should_flush(size));
    assert!(memtable.should_flush(size - 1));
}

#[test]
fn test_clear() {
    let memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.delete(b"key2".to_vec());

    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.get(b"key1"), None);
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_sorted_with_tombstones() {
    let memtable = MemTable::new();

    memtable.put(b"cherry".to_vec(), b"3".to_vec());
    memtable.delete(b"banana".to_vec());
    memtable.put(b"apple".to_vec(), b"1".to_vec());

    let entries: Vec<_> = memtable.iter().collect();

    assert_eq!(
        entries,
        vec![
            (b"apple".to_vec(), MemTableEntry::Value(b"1".to_vec())),
            (b"banana".to_vec(), MemTableEntry::Tombstone),
            (b"cherry".to_vec(), MemTableEntry::Value(b"3".to_vec())),
        ]
    );
}

#[test]
fn test_iter_is_a_snapshot() {
    let memtable = MemTable::new();
    memtable.put(b"key".to_vec(), b"value".to_vec());

    let snapshot = memtable.iter();
    memtable.put(b"key".to_vec(), b"modified".to_vec());
    memtable.put(b"other".to_vec(), b"x".to_vec());

    let entries: Vec<_> = snapshot.collect();
    assert_eq!(entries, vec![(b"key".to_vec(), MemTableEntry::Value(b"value".to_vec()))]);
}

#[test]
fn test_scan_prefix_keys_stays_in_namespace() {
    let memtable = MemTable::new();

    memtable.put(b"d/a".to_vec(), b"1".to_vec());
    memtable.put(b"d/b".to_vec(), b"2".to_vec());
    memtable.delete(b"d/c".to_vec());
    memtable.put(b"m/next_sequence".to_vec(), vec![0, 0, 0, 0, 0, 0, 0, 2]);
    memtable.put(b"r/\0\0\0\0\0\0\0\x01".to_vec(), b"a".to_vec());
    memtable.put(b"d".to_vec(), b"no slash".to_vec());

    let data = memtable.scan_prefix_keys(b"d/");
    assert_eq!(
        data,
        vec![
            (b"d/a".to_vec(), true),
            (b"d/b".to_vec(), true),
            (b"d/c".to_vec(), false),
        ]
    );

    assert_eq!(memtable.scan_prefix_keys(b"r/").len(), 1);
    assert!(memtable.scan_prefix_keys(b"x/").is_empty());
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_reads() {
    let memtable = Arc::new(MemTable::new());
    memtable.put(b"key".to_vec(), b"value".to_vec());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let mt = Arc::clone(&memtable);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert_eq!(mt.get(b"key"), Some(MemTableEntry::Value(b"value".to_vec())));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_writes_track_size() {
    let memtable = Arc::new(MemTable::new());

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let mt = Arc::clone(&memtable);
            thread::spawn(move || {
                for j in 0..10 {
                    mt.put(format!("k{}_{}", i, j).into_bytes(), vec![0u8; 6]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 100);
    // Every key is 4 bytes long here
    assert_eq!(memtable.size(), 100 * (4 + 6));
}

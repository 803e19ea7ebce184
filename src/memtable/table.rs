//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::batch::Operation;

use super::MemTableEntry;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, MemTableEntry>>,
    /// Approximate size in bytes (keys + live values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key, tombstones included
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair, returning the new memtable size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, MemTableEntry::Value(value))
    }

    /// Delete a key (inserts tombstone), returning the new memtable size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, MemTableEntry::Tombstone)
    }

    /// Apply every operation of a batch under a single write lock
    pub fn apply(&self, operations: &[Operation]) -> usize {
        let mut data = self.data.write();
        let mut size = self.size.load(Ordering::SeqCst);
        for op in operations {
            size = match op {
                Operation::Put { key, value } => {
                    self.insert_locked(&mut data, key.clone(), MemTableEntry::Value(value.clone()))
                }
                Operation::Delete { key } => {
                    self.insert_locked(&mut data, key.clone(), MemTableEntry::Tombstone)
                }
            };
        }
        size
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, MemTableEntry>,
        key: Vec<u8>,
        entry: MemTableEntry,
    ) -> usize {
        let key_len = key.len();
        let footprint = entry.footprint();
        // Key bytes are only counted the first time a key shows up
        let (added, removed) = match data.insert(key, entry) {
            Some(old) => (footprint, old.footprint()),
            None => (key_len + footprint, 0),
        };
        let previous = self.size.load(Ordering::SeqCst);
        let new_size = previous + added - removed;
        self.size.store(new_size, Ordering::SeqCst);
        new_size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Smallest key strictly greater than `after` (or the first key), tombstones included
    pub fn next_key_after(&self, after: Option<&[u8]>) -> Option<Vec<u8>> {
        let data = self.data.read();
        let lower = match after {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        data.range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> MemTableIterator {
        let snapshot = self.data.read().clone();
        MemTableIterator {
            inner: snapshot.into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a MemTable snapshot
pub struct MemTableIterator {
    inner: btree_map::IntoIter<Vec<u8>, MemTableEntry>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

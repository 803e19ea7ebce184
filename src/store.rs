//! Store Module
//!
//! An on-disk ordered key-value store that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Commit batches atomically with optional durability
//! - Flush the MemTable when full and compact when tables pile up
//! - Manage crash recovery on startup
//! - Hand out forward cursors in key order

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::batch::Batch;
use crate::config::{StoreOptions, WriteOptions};
use crate::error::{Result, ShrinkError};
use crate::handle::KeyValue;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{CompactionStats, StorageManager};
use crate::wal::{WalRecovery, WalWriter};

/// An open store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (write/flush/compact): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable → storage
/// - **Reads** (get/cursors): No write_lock needed
///   - MemTable uses an internal RwLock; a batch is applied under one lock
///     so readers see all of it or none of it
///
/// Dropping a store closes it; [`Store::close`] does the same but reports errors.
pub struct Store {
    options: StoreOptions,

    /// Root directory of this store
    root: PathBuf,

    /// Directory for SSTables
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,

    closed: bool,
}

impl Store {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create a store rooted at `path`
    ///
    /// On startup:
    /// 1. Check or create the root directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL, flush what it held and start a fresh log
    ///
    /// Any failure is reported as [`ShrinkError::Open`].
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        Self::open_inner(path, options).map_err(|e| ShrinkError::open(path, e))
    }

    fn open_inner(root: &Path, options: StoreOptions) -> Result<Self> {
        if !root.exists() {
            if !options.create_if_missing {
                return Err(ShrinkError::Storage("store does not exist".to_string()));
            }
            fs::create_dir_all(root)?;
        } else if !root.is_dir() {
            return Err(ShrinkError::Storage("store root is not a directory".to_string()));
        }

        // Derived from root, not configurable
        let storage_dir = root.join(Self::SSTABLE_DIR);
        let wal_path = root.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let mut next_lsn = 1;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                info!(
                    path = %root.display(),
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in &entries {
                memtable.apply(&entry.operations);
            }

            // Recovered batches go to an SSTable before the log is reset
            if !memtable.is_empty() {
                storage.flush(&memtable)?;
                memtable.clear();
            }

            next_lsn = recovery.last_lsn + 1;
        }

        let wal = WalWriter::create(&wal_path, next_lsn, options.wal_sync_strategy)?;

        debug!(
            path = %root.display(),
            sstables = storage.sstable_count(),
            "store opened"
        );

        Ok(Self {
            options,
            root: root.to_path_buf(),
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            closed: false,
        })
    }

    /// Commit a batch atomically
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Flush the MemTable first if it is full
    /// 3. Append the whole batch as one WAL record (fsync if `options.sync`)
    /// 4. Apply the batch to the MemTable
    ///
    /// If this returns an error nothing of the batch is visible or logged.
    pub fn write(&self, batch: &Batch, options: WriteOptions) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _write_guard = self.write_lock.lock();

        if self.memtable.should_flush(self.options.memtable_size_limit) {
            self.flush_internal()?;
        }

        self.wal
            .lock()
            .append(batch.operations().to_vec(), options.sync)?;

        self.memtable.apply(batch.operations());

        Ok(())
    }

    /// Put a single key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(key, value);
        self.write(&batch, WriteOptions::default())
    }

    /// Delete a single key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut batch = Batch::new();
        batch.delete(key);
        self.write(&batch, WriteOptions::default())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(Some(value)),
                MemTableEntry::Tombstone => Ok(None),
            };
        }

        self.storage.get(key)
    }

    /// Forward cursor over live entries in key order, starting at the first key
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            store: self,
            last_key: None,
            done: false,
        }
    }

    /// Flush memtable to disk
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Flush, then merge every SSTable into one and drop tombstones
    ///
    /// Afterwards the on-disk footprint holds only live entries.
    pub fn compact(&self) -> Result<CompactionStats> {
        let _write_guard = self.write_lock.lock();
        self.flush_memtable()?;
        self.storage.compact()
    }

    /// Called with write lock held
    fn flush_internal(&self) -> Result<()> {
        self.flush_memtable()?;

        let threshold = self.options.compaction_threshold;
        if threshold > 0 && self.storage.sstable_count() >= threshold {
            self.storage.compact()?;
        }

        Ok(())
    }

    /// Called with write lock held
    fn flush_memtable(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in an SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Smallest key after `after` in memtable or tables, tombstones included
    fn next_key_after(&self, after: Option<&[u8]>) -> Option<Vec<u8>> {
        let in_memory = self.memtable.next_key_after(after);
        let on_disk = self.storage.next_key_after(after);

        match (in_memory, on_disk) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Close the store gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.flush()?;
        self.wal.lock().sync()?;

        debug!(path = %self.root.display(), "store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Root directory of the store
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Current WAL length in bytes
    pub fn wal_len(&self) -> u64 {
        self.wal.lock().len()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(path = %self.root.display(), error = %e, "store did not close cleanly");
        }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Lazy forward cursor over a store's live entries
///
/// The cursor only remembers the last key it returned; each step looks up
/// the next live key after it. Commits, flushes and compactions on the same
/// store may happen while the cursor is live, and keys at or before the
/// cursor position are never revisited.
pub struct Cursor<'a> {
    store: &'a Store,
    last_key: Option<Vec<u8>>,
    done: bool,
}

impl Iterator for Cursor<'_> {
    type Item = Result<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let key = match self.store.next_key_after(self.last_key.as_deref()) {
                Some(key) => key,
                None => {
                    self.done = true;
                    break;
                }
            };

            match self.store.get(&key) {
                Ok(Some(value)) => {
                    self.last_key = Some(key.clone());
                    return Some(Ok((key, value)));
                }
                // Tombstone, keep scanning
                Ok(None) => self.last_key = Some(key),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        None
    }
}

//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Merge all SSTables into one during compaction, dropping tombstones

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, ShrinkError};
use crate::memtable::{MemTable, MemTableEntry};

use super::sstable::{TABLE_EXTENSION, TEMP_EXTENSION};
use super::{SSTable, SSTableBuilder, SSTableReader};

/// Outcome of a full compaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Number of tables merged
    pub tables_in: usize,
    /// Live entries written to the output table
    pub entries_out: u64,
    /// Bytes occupied by the merged tables
    pub bytes_in: u64,
    /// Bytes occupied by the output table (0 when everything was deleted)
    pub bytes_out: u64,
}

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove tables left half-written by a crash
    /// 3. Open readers for each finished table (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }

            match file_path.extension().and_then(|e| e.to_str()) {
                Some(TABLE_EXTENSION) => {
                    if let Some(id) = Self::parse_sstable_id(&file_path) {
                        sstable_ids.push(id);
                    }
                }
                Some(TEMP_EXTENSION) => {
                    warn!(path = %file_path.display(), "removing unfinished SSTable");
                    fs::remove_file(&file_path)?;
                }
                _ => {}
            }
        }

        // Newest (highest ID) first
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            sstables.push(SSTableReader::open(&sstable_path)?);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or found tombstone (deleted)
    ///
    /// Uses the write lock because `SSTableReader::get()` moves the file cursor.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }

            match reader.get(key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => return Ok(None),
                Err(ShrinkError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Smallest key strictly greater than `after` across all tables
    ///
    /// Tombstoned keys are included; callers resolve them with `get`.
    pub fn next_key_after(&self, after: Option<&[u8]>) -> Option<Vec<u8>> {
        let sstables = self.sstables.read();
        sstables
            .iter()
            .filter_map(|reader| reader.next_key_after(after))
            .min()
            .map(|k| k.to_vec())
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Tombstones are written too, since older tables may still hold the key.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(ShrinkError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        // Entries come out of the BTreeMap already sorted
        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let metadata = builder.finish()?;
        self.sync_dir();

        let reader = SSTableReader::open(&path)?;

        let mut sstables = self.sstables.write();
        sstables.insert(0, reader);

        debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "flushed memtable to SSTable"
        );

        Ok(metadata)
    }

    /// Merge every table into one, newest version wins, tombstones dropped
    ///
    /// Dropping tombstones is only safe because all tables take part. The
    /// merged table is renamed into place before any input is removed, and
    /// inputs are removed oldest first, so an interrupted compaction can
    /// leave extra tables behind but never brings a deleted key back.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut sstables = self.sstables.write();

        if sstables.is_empty() {
            return Ok(CompactionStats::default());
        }

        let mut stats = CompactionStats {
            tables_in: sstables.len(),
            bytes_in: sstables.iter().map(|r| r.file_size()).sum(),
            ..CompactionStats::default()
        };

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);
        let mut builder = SSTableBuilder::new(&path)?;

        {
            let mut iters = Vec::with_capacity(sstables.len());
            for reader in sstables.iter_mut() {
                iters.push(reader.iter()?);
            }

            let mut heads = Vec::with_capacity(iters.len());
            for it in iters.iter_mut() {
                heads.push(it.next().transpose()?);
            }

            loop {
                let min_key = match heads.iter().flatten().map(|(k, _)| k).min() {
                    Some(k) => k.clone(),
                    None => break,
                };

                // Heads are ordered newest → oldest, so the first match wins
                let mut newest: Option<Option<Vec<u8>>> = None;
                for (i, head) in heads.iter_mut().enumerate() {
                    if let Some((key, value)) = head.take() {
                        if key == min_key {
                            if newest.is_none() {
                                newest = Some(value);
                            }
                            *head = iters[i].next().transpose()?;
                        } else {
                            *head = Some((key, value));
                        }
                    }
                }

                if let Some(Some(value)) = newest {
                    builder.add(&min_key, &value)?;
                }
            }
        }

        let merged = if builder.entry_count() == 0 {
            builder.abandon()?;
            None
        } else {
            let metadata = builder.finish()?;
            stats.entries_out = metadata.entry_count;
            stats.bytes_out = metadata.file_size;
            Some(SSTableReader::open(&path)?)
        };
        self.sync_dir();

        let old = std::mem::replace(&mut *sstables, merged.into_iter().collect());
        drop(sstables);

        for reader in old.into_iter().rev() {
            let old_path = reader.path().to_path_buf();
            drop(reader);
            fs::remove_file(&old_path)?;
        }
        self.sync_dir();

        debug!(
            tables_in = stats.tables_in,
            entries_out = stats.entries_out,
            bytes_in = stats.bytes_in,
            bytes_out = stats.bytes_out,
            "compacted SSTables"
        );

        Ok(stats)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Total bytes held by open tables
    pub fn total_bytes(&self) -> u64 {
        self.sstables.read().iter().map(|r| r.file_size()).sum()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.{}", id, TABLE_EXTENSION))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }

    /// Persist renames and removals in the table directory (best effort)
    fn sync_dir(&self) {
        #[cfg(unix)]
        if let Err(e) = fs::File::open(&self.data_dir).and_then(|dir| dir.sync_all()) {
            warn!(path = %self.data_dir.display(), error = %e, "directory sync failed");
        }
    }
}

//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShrinkError};

use super::iterator::SSTableIterator;
use super::{le_u16, le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    file: BufReader<File>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
    file_size: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and the data block CRC, then loads the
    /// entire index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(ShrinkError::Storage(format!(
                "SSTable {} is too short ({} bytes)",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(ShrinkError::Storage(format!(
                "Invalid SSTable magic in {}: got {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = le_u16(&header[4..6]);
        if version != VERSION {
            return Err(ShrinkError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header[6..14]);

        // Footer gives the index offset and data CRC
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(ShrinkError::Storage(format!(
                "SSTable {} has an invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = index_offset - HEADER_SIZE;
        let mut chunk = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let want = remaining.min(chunk.len() as u64) as usize;
            file.read_exact(&mut chunk[..want])?;
            hasher.update(&chunk[..want]);
            remaining -= want as u64;
        }
        if hasher.finalize() != data_crc {
            return Err(ShrinkError::Storage(format!(
                "SSTable {} failed its data checksum",
                path.display()
            )));
        }

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(ShrinkError::Storage(format!(
                    "SSTable {} has a truncated index entry",
                    path.display()
                )));
            }
            let key_len = le_u32(&index_data[pos..pos + 4]) as usize;
            let offset = le_u64(&index_data[pos + 4..pos + 12]);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(ShrinkError::Storage(format!(
                    "SSTable {} has a truncated index key",
                    path.display()
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
            file_size,
        })
    }

    /// Get a value by key, O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(ShrinkError::KeyNotFound),
        };

        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = le_u32(&header[0..4]) as usize;
        let val_len = le_u32(&header[4..8]);

        // Skip the key (we already know it matches)
        self.file.seek(SeekFrom::Current(key_len as i64))?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(None);
        }

        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;

        Ok(Some(value))
    }

    /// Smallest key strictly greater than `after` (or the first key), tombstones included
    pub fn next_key_after(&self, after: Option<&[u8]>) -> Option<&[u8]> {
        let lower = match after {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        self.index
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, _)| k.as_slice())
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Create an iterator over all entries (for compaction)
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }
}

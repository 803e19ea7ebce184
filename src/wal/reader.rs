//! WAL Reader
//!
//! Handles reading records from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, ShrinkError};

use super::entry::{WalEntry, HEADER_SIZE};

/// Reads records from the WAL file in order
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last record successfully read
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next record from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A short header, a short
    /// payload or a CRC mismatch is reported as `WalCorruption`; the reader
    /// position stays at the start of the bad record.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }

        if remaining < HEADER_SIZE as u64 {
            return Err(ShrinkError::WalCorruption(format!(
                "truncated header at offset {}",
                self.position
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        let (lsn, crc, len) = WalEntry::parse_header(&header);

        if remaining - (HEADER_SIZE as u64) < len as u64 {
            return Err(ShrinkError::WalCorruption(format!(
                "truncated record at offset {} (LSN {}, {} payload bytes missing)",
                self.position,
                lsn,
                len as u64 - (remaining - HEADER_SIZE as u64)
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;

        let entry = WalEntry::decode(lsn, crc, &payload)?;
        self.position += (HEADER_SIZE + payload.len()) as u64;

        Ok(Some(entry))
    }

    /// Offset just past the last good record
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid records
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL records; stops after the first error
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

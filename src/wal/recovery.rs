//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::error::{Result, ShrinkError};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted records found (scanning stops at the first one)
    pub entries_corrupted: u64,

    /// Last valid LSN (0 when the log holds no valid record)
    pub last_lsn: u64,

    /// Length of the valid prefix of the log
    pub valid_len: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover records from a WAL file
    ///
    /// This will:
    /// 1. Read all valid records
    /// 2. Stop at the first torn or corrupted record
    /// 3. Truncate the log to the valid prefix
    /// 4. Return all valid records in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result) = Self::scan(path, true)?;

        if result.entries_corrupted > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;

            warn!(
                path = %path.display(),
                valid_len = result.valid_len,
                last_lsn = result.last_lsn,
                "discarded torn or corrupted WAL tail"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, keep_entries: bool) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    if entry.lsn <= result.last_lsn {
                        // Out-of-order LSN: treat the rest of the log as garbage
                        result.entries_corrupted += 1;
                        break;
                    }
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    result.valid_len = reader.position();
                    if keep_entries {
                        entries.push(entry);
                    }
                }
                Ok(None) => break,
                Err(ShrinkError::WalCorruption(_)) => {
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result))
    }
}

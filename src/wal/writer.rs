//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::batch::Operation;
use crate::config::WalSyncStrategy;
use crate::error::{Result, ShrinkError};

use super::{WalEntry, WalRecovery};

/// Writes records to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// LSN assigned to the next record
    next_lsn: u64,
    /// Current length of the log in bytes
    len: u64,
    sync_strategy: WalSyncStrategy,
    /// Records appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, appending after its last valid record
    ///
    /// A torn tail left by a crash is cut off first so new records never
    /// land behind garbage.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let (next_lsn, len) = if path.exists() {
            let (_, result) = WalRecovery::recover(path)?;
            (result.last_lsn + 1, result.valid_len)
        } else {
            (1, 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn,
            len,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Create an empty WAL file, discarding any previous content
    ///
    /// LSNs continue from `next_lsn`.
    pub fn create(path: &Path, next_lsn: u64, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        file.sync_all()?;
        drop(file);

        let file = OpenOptions::new().append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: next_lsn.max(1),
            len: 0,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append one record holding `operations`, returning its LSN
    ///
    /// With `sync` the record is on stable storage before this returns;
    /// otherwise the configured strategy decides when to fsync. On failure
    /// the file is cut back to its previous length.
    pub fn append(&mut self, operations: Vec<Operation>, sync: bool) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = WalEntry::new(lsn, operations).serialize()?;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback();
            return Err(ShrinkError::WalWrite(format!("append LSN {}: {}", lsn, e)));
        }

        let must_sync = sync
            || match self.sync_strategy {
                WalSyncStrategy::EveryWrite => true,
                WalSyncStrategy::EveryNWrites { count } => self.unsynced + 1 >= count,
            };

        if must_sync {
            if let Err(e) = self.file.sync_data() {
                self.rollback();
                return Err(ShrinkError::WalWrite(format!("sync LSN {}: {}", lsn, e)));
            }
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }

        self.len += bytes.len() as u64;
        self.next_lsn += 1;

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Empty the log once its records are durable elsewhere
    ///
    /// LSNs keep increasing across truncation.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN that the next appended record will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Current log length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            error!(
                path = %self.path.display(),
                error = %e,
                "failed to roll back partial WAL record"
            );
        }
    }
}

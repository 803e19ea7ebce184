//! Storage handle trait
//!
//! The capability set the migration engine needs from a store: a forward
//! cursor, atomic batch commits and compaction. [`Store`] is the production
//! implementation.

use std::path::Path;

use crate::batch::Batch;
use crate::config::WriteOptions;
use crate::error::Result;
use crate::store::{Cursor, Store};

/// A key-value pair
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Ordered key-value store as seen by the migration engine
pub trait StorageHandle {
    /// Forward cursor yielding live entries in key order
    type Cursor<'a>: Iterator<Item = Result<KeyValue>>
    where
        Self: 'a;

    /// Root directory of the store's persistent files
    fn root(&self) -> &Path;

    /// Start a cursor at the first key
    fn cursor(&self) -> Self::Cursor<'_>;

    /// Commit a batch atomically
    fn commit(&self, batch: &Batch, options: WriteOptions) -> Result<()>;

    /// Reclaim space held by overwritten and deleted entries
    fn compact(&self) -> Result<()>;
}

impl StorageHandle for Store {
    type Cursor<'a> = Cursor<'a>;

    fn root(&self) -> &Path {
        self.path()
    }

    fn cursor(&self) -> Cursor<'_> {
        Store::cursor(self)
    }

    fn commit(&self, batch: &Batch, options: WriteOptions) -> Result<()> {
        self.write(batch, options)
    }

    fn compact(&self) -> Result<()> {
        Store::compact(self).map(|_| ())
    }
}

//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Point lookups and ordered key discovery for forward cursors
//! - Full compaction so deletes actually release disk space
//!
//! See [`sstable`] for the file format.

pub mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::{CompactionStats, StorageManager};

//! # kvshrink
//!
//! Shrinks an oversized key-value store by relocating entries into a second
//! store until the source drops below a size ceiling:
//! - Bounded rounds: each round commits one batch per store
//! - On-disk size re-measured after every round
//! - Read-only stats mode reporting a store's on-disk size
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runner (CLI)                            │
//! │              stats mode │ migration mode                     │
//! └──────────┬──────────────┴───────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐          ┌─────────────────────┐
//!   │   SizeProbe     │◄─────────│   Migrator          │
//!   │ (directory walk)│          │ (rounds of batches) │
//!   └─────────────────┘          └─────┬─────────┬─────┘
//!                                      │         │
//!                              source  ▼         ▼  target
//!                               ┌───────────┐ ┌───────────┐
//!                               │   Store   │ │   Store   │
//!                               │ WAL       │ │ WAL       │
//!                               │ MemTable  │ │ MemTable  │
//!                               │ SSTables  │ │ SSTables  │
//!                               └───────────┘ └───────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod batch;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod store;
pub mod handle;

pub mod probe;
pub mod migrate;
pub mod runner;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use batch::{Batch, Operation};
pub use config::{Config, StoreOptions, WriteOptions};
pub use error::{Result, ShrinkError, StoreRole};
pub use handle::{KeyValue, StorageHandle};
pub use migrate::{MigrationPlan, MigrationStats, Migrator, Outcome, RoundReport};
pub use probe::{DirectorySize, SizeProbe};
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvshrink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

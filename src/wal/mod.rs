//! Write-Ahead Log (WAL) Module
//!
//! Provides durability and batch atomicity through append-only logging.
//!
//! ## Responsibilities
//! - Append one record per committed batch before it is applied
//! - CRC32 checksums for corruption and torn-write detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Record 1                                     │
//! │ ┌─────────┬─────────┬─────────┬────────────┐ │
//! │ │ LSN (8) │ CRC (4) │ Len (4) │ Payload    │ │
//! │ └─────────┴─────────┴─────────┴────────────┘ │
//! ├──────────────────────────────────────────────┤
//! │ Record 2                                     │
//! │ ┌─────────┬─────────┬─────────┬────────────┐ │
//! │ │ LSN (8) │ CRC (4) │ Len (4) │ Payload    │ │
//! │ └─────────┴─────────┴─────────┴────────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The payload is the bincode encoding of the batch's operations plus a
//! timestamp. The CRC covers the LSN and the payload, so a record cut short
//! by a crash never replays.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, HEADER_SIZE};
pub use writer::WalWriter;
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};

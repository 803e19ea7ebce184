//! WAL Entry definitions
//!
//! Defines the structure of individual WAL records and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::batch::Operation;
use crate::error::{Result, ShrinkError};

/// Record header: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// A single record in the WAL: one committed batch
#[derive(Debug, Clone, PartialEq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The batch's operations, applied together on replay
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

impl WalEntry {
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Encode as a framed record: header followed by payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&(&self.operations, self.timestamp))?;

        let len: u32 = payload.len().try_into().map_err(|_| {
            ShrinkError::WalWrite(format!("record of {} bytes is too large", payload.len()))
        })?;

        let crc = Self::compute_crc(self.lsn, &payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Split a header into (lsn, crc, payload length)
    pub(super) fn parse_header(header: &[u8; HEADER_SIZE]) -> (u64, u32, u32) {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len),
        )
    }

    /// Rebuild an entry from its header fields and payload, checking the CRC
    pub(super) fn decode(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(lsn, payload);
        if actual != crc {
            return Err(ShrinkError::WalCorruption(format!(
                "CRC mismatch for LSN {}: expected {:#010x}, got {:#010x}",
                lsn, crc, actual
            )));
        }

        let (operations, timestamp): (Vec<Operation>, u64) = bincode::deserialize(payload)
            .map_err(|e| ShrinkError::WalCorruption(format!("LSN {}: {}", lsn, e)))?;

        Ok(Self {
            lsn,
            operations,
            timestamp,
        })
    }

    fn compute_crc(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}

//! Write batches
//!
//! A batch is an ordered list of put/delete operations scoped to one store.
//! The store logs a batch as a single WAL record, so either every operation
//! in it becomes visible or none does.

use serde::{Deserialize, Serialize};

/// Operations that can be logged and applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

/// Ordered group of operations committed atomically to one store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Operation>,
    /// Key + value bytes carried by the batch
    payload_bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an upsert
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.payload_bytes += key.len() + value.len();
        self.ops.push(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Queue a delete
    pub fn delete(&mut self, key: &[u8]) {
        self.payload_bytes += key.len();
        self.ops.push(Operation::Delete { key: key.to_vec() });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Drop every queued operation
    pub fn clear(&mut self) {
        self.ops.clear();
        self.payload_bytes = 0;
    }
}

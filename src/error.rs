//! Error types for kvshrink
//!
//! Provides a unified error type for all operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ShrinkError
pub type Result<T> = std::result::Result<T, ShrinkError>;

/// Which side of a migration a store plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    Source,
    Target,
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Unified error type for kvshrink operations
#[derive(Debug, Error)]
pub enum ShrinkError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot measure size of {}: {cause}", path.display())]
    SizeProbe {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Store Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("cannot open store at {}: {cause}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        cause: Box<ShrinkError>,
    },

    #[error("commit to {role} store failed: {cause}")]
    Commit {
        role: StoreRole,
        #[source]
        cause: Box<ShrinkError>,
    },

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShrinkError {
    /// Process exit code for this error
    ///
    /// | code | kind |
    /// |------|------|
    /// | 2 | configuration |
    /// | 3 | store open |
    /// | 4 | size probe |
    /// | 5 | batch commit |
    /// | 1 | anything else |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Open { .. } => 3,
            Self::SizeProbe { .. } => 4,
            Self::Commit { .. } => 5,
            _ => 1,
        }
    }

    pub(crate) fn open(path: impl Into<PathBuf>, cause: ShrinkError) -> Self {
        Self::Open {
            path: path.into(),
            cause: Box::new(cause),
        }
    }

    pub(crate) fn commit(role: StoreRole, cause: ShrinkError) -> Self {
        Self::Commit {
            role,
            cause: Box::new(cause),
        }
    }
}

impl From<bincode::Error> for ShrinkError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

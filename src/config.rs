//! Configuration for kvshrink
//!
//! Two layers live here:
//! - [`StoreOptions`] / [`WriteOptions`]: how a single store is opened and written
//! - [`Config`]: the run record assembled from the command line, validated
//!   into a [`RunMode`] before any store is touched

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ShrinkError};
use crate::migrate::MigrationPlan;

/// Default number of entries relocated per round
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// =============================================================================
// Store Options
// =============================================================================

/// Options used when opening a [`Store`](crate::store::Store)
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Create the store directory tree if it does not exist
    pub create_if_missing: bool,

    /// How often to fsync the WAL for writes that do not request sync
    pub wal_sync_strategy: WalSyncStrategy,

    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    /// Number of table files that triggers a full compaction after a flush
    pub compaction_threshold: usize,
}

/// WAL sync strategy for unsynced writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced writes (balanced durability/performance)
    EveryNWrites { count: usize },
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            wal_sync_strategy: WalSyncStrategy::EveryNWrites { count: 100 },
            memtable_size_limit: 4 * 1024 * 1024, // 4 MB
            compaction_threshold: 4,
        }
    }
}

impl StoreOptions {
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.wal_sync_strategy = strategy;
        self
    }

    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.memtable_size_limit = size;
        self
    }

    pub fn compaction_threshold(mut self, count: usize) -> Self {
        self.compaction_threshold = count;
        self
    }
}

/// Per-write durability options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// When true the batch is on stable storage before `write` returns
    pub sync: bool,
}

impl WriteOptions {
    /// Options requiring durability before the write returns
    pub fn synced() -> Self {
        Self { sync: true }
    }
}

// =============================================================================
// Run Configuration
// =============================================================================

/// Run record for one invocation of the tool
#[derive(Debug, Clone)]
pub struct Config {
    /// Only report the size of the source store
    pub stats: bool,

    /// Root of the source store
    pub source_dir: PathBuf,

    /// Root of the target store (migration mode only)
    pub target_dir: Option<PathBuf>,

    /// Ceiling in bytes for the source store (migration mode only)
    pub max_size: u64,

    /// Entries per commit round
    pub batch_size: usize,

    /// Compact the source during the run so deletions show up on disk
    pub compact_source: bool,

    /// Options applied to both stores
    pub store_options: StoreOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stats: false,
            source_dir: PathBuf::new(),
            target_dir: None,
            max_size: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            compact_source: true,
            store_options: StoreOptions::default(),
        }
    }
}

/// What a validated [`Config`] asks the tool to do
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Print the on-disk size of a store and exit
    Stats { source_dir: PathBuf },

    /// Shrink the source store by moving entries into the target store
    Migrate(MigrationSettings),
}

/// Everything a migration run needs, already validated
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub plan: MigrationPlan,
    pub store_options: StoreOptions,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate the record and decide which mode to run
    ///
    /// Stats mode only needs a source path. Migration mode needs a target
    /// path that is neither the source nor inside it, a ceiling of at least
    /// one byte, a batch size of at least one entry and a non-zero memtable
    /// limit. Paths are compared after resolving `.`, `..` and symlinks.
    pub fn mode(&self) -> Result<RunMode> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(ShrinkError::Config("source path is required".to_string()));
        }

        if self.stats {
            return Ok(RunMode::Stats {
                source_dir: self.source_dir.clone(),
            });
        }

        let target_dir = match &self.target_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => {
                return Err(ShrinkError::Config(
                    "target path is required in migration mode".to_string(),
                ))
            }
        };

        let source = resolve_path(&self.source_dir)?;
        let target = resolve_path(&target_dir)?;
        if target == source {
            return Err(ShrinkError::Config(
                "target path must differ from source path".to_string(),
            ));
        }
        if target.starts_with(&source) {
            return Err(ShrinkError::Config(
                "target path must not be inside source path".to_string(),
            ));
        }

        if self.max_size < 1 {
            return Err(ShrinkError::Config(
                "max size should be more than zero".to_string(),
            ));
        }

        if self.batch_size < 1 {
            return Err(ShrinkError::Config(
                "batch size should be more than zero".to_string(),
            ));
        }

        if self.store_options.memtable_size_limit < 1 {
            return Err(ShrinkError::Config(
                "memtable size limit should be more than zero".to_string(),
            ));
        }

        Ok(RunMode::Migrate(MigrationSettings {
            source_dir: self.source_dir.clone(),
            target_dir,
            plan: MigrationPlan {
                max_source_size: self.max_size,
                batch_size: self.batch_size,
                compact_source: self.compact_source,
            },
            store_options: self.store_options.clone(),
        }))
    }
}

/// Absolute, lexically normalized form of `path` with symlinks resolved in
/// the longest prefix that exists on disk
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return Ok(missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Run in stats mode (size report only)
    pub fn stats(mut self, stats: bool) -> Self {
        self.config.stats = stats;
        self
    }

    /// Set the source store root
    pub fn source_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source_dir = path.into();
        self
    }

    /// Set the target store root
    pub fn target_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.target_dir = Some(path.into());
        self
    }

    /// Set the source size ceiling (in bytes)
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.config.max_size = bytes;
        self
    }

    /// Set the number of entries per round
    pub fn batch_size(mut self, entries: usize) -> Self {
        self.config.batch_size = entries;
        self
    }

    /// Enable or disable scheduled source compaction during the run
    pub fn compact_source(mut self, compact: bool) -> Self {
        self.config.compact_source = compact;
        self
    }

    /// Set the memtable size limit (in bytes) for both stores
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.store_options.memtable_size_limit = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

//! Migration Engine
//!
//! Shrinks a source store below a size ceiling by relocating entries, in key
//! order, into a target store.
//!
//! ## Round structure
//! ```text
//!   cursor ──► stage (put → target batch, delete → source batch)
//!                │
//!                ▼  batch_size entries staged (or cursor exhausted)
//!   commit target (sync) ──► commit source (sync) ──► compact source if due
//!                │
//!                ▼
//!   probe source size ──► ≤ ceiling? stop : next round
//! ```
//!
//! ## Compaction schedule
//! Deletes only free disk space once the source is compacted, and a
//! compaction rewrites every live entry. Compacting each round would make a
//! full drain quadratic, so a round compacts only when one of these holds:
//! - the payload deleted since the last compaction reaches a quarter of the
//!   source size measured then
//! - the estimated post-compaction size is at or below the ceiling
//! - the cursor is exhausted (last round)
//!
//! The estimate scales deleted payload bytes by the on-disk bytes each
//! deleted payload byte freed at the previous compaction (1.0 until the
//! first one).
//!
//! ## Consistency
//! The two stores commit independently. The target batch is committed
//! first, so an interruption between the two commits leaves the round's
//! entries in both stores and never in neither. Running the migration again
//! converges: a duplicated entry is put into the target again with the same
//! value and removed from the source.

use tracing::{debug, info};

use crate::batch::Batch;
use crate::config::{WriteOptions, DEFAULT_BATCH_SIZE};
use crate::error::{Result, ShrinkError, StoreRole};
use crate::handle::StorageHandle;
use crate::probe::{DirectorySize, SizeProbe};

/// Parameters of one migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Ceiling in bytes for the source store
    pub max_source_size: u64,

    /// Entries relocated per round
    pub batch_size: usize,

    /// Compact the source on schedule so the probe sees freed space
    pub compact_source: bool,
}

impl MigrationPlan {
    pub fn new(max_source_size: u64) -> Self {
        Self {
            max_source_size,
            batch_size: DEFAULT_BATCH_SIZE,
            compact_source: true,
        }
    }

    pub fn batch_size(mut self, entries: usize) -> Self {
        self.batch_size = entries;
        self
    }

    pub fn compact_source(mut self, compact: bool) -> Self {
        self.compact_source = compact;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_source_size < 1 {
            return Err(ShrinkError::Config(
                "max size should be more than zero".to_string(),
            ));
        }
        if self.batch_size < 1 {
            return Err(ShrinkError::Config(
                "batch size should be more than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Committed rounds
    pub rounds: u64,
    /// Entries relocated to the target
    pub entries_moved: u64,
    /// Key + value bytes relocated to the target
    pub bytes_moved: u64,
    /// Source compactions run
    pub compactions: u64,
    /// Source size measured before the scan
    pub initial_source_size: u64,
    /// Source size at the last probe
    pub final_source_size: u64,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The source is at or below the ceiling
    TargetReached(MigrationStats),

    /// Every entry was relocated and the source is still above the ceiling
    SourceDrained(MigrationStats),
}

impl Outcome {
    pub fn stats(&self) -> &MigrationStats {
        match self {
            Outcome::TargetReached(stats) | Outcome::SourceDrained(stats) => stats,
        }
    }

    pub fn is_target_reached(&self) -> bool {
        matches!(self, Outcome::TargetReached(_))
    }
}

/// Progress after a committed round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    /// 1-based round number
    pub round: u64,
    /// Entries relocated in this round
    pub entries: usize,
    /// Entries relocated so far
    pub total_moved: u64,
    /// Whether the source was compacted before it was measured
    pub compacted: bool,
    /// Source size measured after the round
    pub source_size: u64,
    /// Ceiling the run is aiming for
    pub max_source_size: u64,
}

/// Pending batches for the current round
#[derive(Debug, Default)]
struct RoundBatches {
    source: Batch,
    target: Batch,
    entries: usize,
}

impl RoundBatches {
    /// Stage one relocation: the entry is put into the target and deleted
    /// from the source, one operation per store.
    fn stage(&mut self, key: &[u8], value: &[u8]) {
        self.target.put(key, value);
        self.source.delete(key);
        self.entries += 1;
    }

    /// Key + value bytes of the staged entries
    fn payload_bytes(&self) -> u64 {
        self.target.payload_bytes() as u64
    }

    fn clear(&mut self) {
        self.source.clear();
        self.target.clear();
        self.entries = 0;
    }
}

/// Compact once deleted payload reaches 1/DIVISOR of the baseline size
const COMPACTION_DIVISOR: u64 = 4;

/// Decides which rounds compact the source
#[derive(Debug)]
struct CompactionSchedule {
    /// Source size measured after the last compaction, or before the scan
    baseline: u64,
    /// Payload bytes deleted from the source since the baseline
    pending: u64,
    /// On-disk bytes freed per deleted payload byte at the last compaction
    ratio: f64,
}

impl CompactionSchedule {
    fn new(baseline: u64) -> Self {
        Self {
            baseline,
            pending: 0,
            ratio: 1.0,
        }
    }

    fn record(&mut self, deleted: u64) {
        self.pending += deleted;
    }

    fn is_due(&self, ceiling: u64, last_round: bool) -> bool {
        if self.pending == 0 {
            return false;
        }

        last_round
            || self.pending.saturating_mul(COMPACTION_DIVISOR) >= self.baseline
            || self.estimated_size() <= ceiling
    }

    fn estimated_size(&self) -> u64 {
        let freed = (self.pending as f64 * self.ratio) as u64;
        self.baseline.saturating_sub(freed)
    }

    /// Reset after a compaction that left the source at `size` bytes
    fn compacted(&mut self, size: u64) {
        let freed = self.baseline.saturating_sub(size);
        if freed > 0 && self.pending > 0 {
            self.ratio = freed as f64 / self.pending as f64;
        }
        self.baseline = size;
        self.pending = 0;
    }
}

/// Drives one migration run between two open stores
///
/// Both stores are borrowed for the run; opening and closing them is the
/// caller's job.
pub struct Migrator<'a, S, T, P = DirectorySize> {
    source: &'a S,
    target: &'a T,
    probe: P,
    plan: MigrationPlan,
}

impl<'a, S, T> Migrator<'a, S, T, DirectorySize>
where
    S: StorageHandle,
    T: StorageHandle,
{
    pub fn new(source: &'a S, target: &'a T, plan: MigrationPlan) -> Self {
        Self {
            source,
            target,
            probe: DirectorySize,
            plan,
        }
    }
}

impl<'a, S, T, P> Migrator<'a, S, T, P>
where
    S: StorageHandle,
    T: StorageHandle,
    P: SizeProbe,
{
    /// Measure the source with a different probe
    pub fn with_probe<Q: SizeProbe>(self, probe: Q) -> Migrator<'a, S, T, Q> {
        Migrator {
            source: self.source,
            target: self.target,
            probe,
            plan: self.plan,
        }
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    /// Run to completion without a progress observer
    pub fn run(&self) -> Result<Outcome> {
        self.run_with(|_| {})
    }

    /// Run to completion, calling `on_round` after every committed round
    ///
    /// Stops when the source probe reports a size at or below the ceiling,
    /// when the source runs out of entries, or at the first error. Rounds
    /// committed before an error stay committed; the round in flight is
    /// not applied to the store whose commit failed.
    pub fn run_with<F>(&self, mut on_round: F) -> Result<Outcome>
    where
        F: FnMut(&RoundReport),
    {
        self.plan.validate()?;

        let ceiling = self.plan.max_source_size;
        let initial = self.measure_source()?;
        let mut stats = MigrationStats {
            initial_source_size: initial,
            final_source_size: initial,
            ..MigrationStats::default()
        };

        if initial <= ceiling {
            info!(size = initial, ceiling, "source already within ceiling");
            return Ok(Outcome::TargetReached(stats));
        }

        info!(
            source = %self.source.root().display(),
            target = %self.target.root().display(),
            size = initial,
            ceiling,
            batch_size = self.plan.batch_size,
            "starting migration"
        );

        let mut staged = RoundBatches::default();
        let mut schedule = CompactionSchedule::new(initial);
        let mut cursor = self.source.cursor().peekable();

        while let Some(item) = cursor.next() {
            let (key, value) = item?;
            staged.stage(&key, &value);

            let last_round = cursor.peek().is_none();
            if staged.entries >= self.plan.batch_size || last_round {
                let size = self.commit_round(
                    &mut staged,
                    &mut stats,
                    &mut schedule,
                    last_round,
                    &mut on_round,
                )?;
                if size <= ceiling {
                    return Ok(Outcome::TargetReached(stats));
                }
            }
        }

        info!(
            size = stats.final_source_size,
            ceiling,
            moved = stats.entries_moved,
            "source drained before reaching ceiling"
        );

        Ok(Outcome::SourceDrained(stats))
    }

    /// Commit the staged round to both stores and probe the source
    fn commit_round<F>(
        &self,
        staged: &mut RoundBatches,
        stats: &mut MigrationStats,
        schedule: &mut CompactionSchedule,
        last_round: bool,
        on_round: &mut F,
    ) -> Result<u64>
    where
        F: FnMut(&RoundReport),
    {
        // Target before source: an entry is always in at least one store
        self.target
            .commit(&staged.target, WriteOptions::synced())
            .map_err(|e| ShrinkError::commit(StoreRole::Target, e))?;
        self.source
            .commit(&staged.source, WriteOptions::synced())
            .map_err(|e| ShrinkError::commit(StoreRole::Source, e))?;

        let bytes = staged.payload_bytes();
        stats.rounds += 1;
        stats.entries_moved += staged.entries as u64;
        stats.bytes_moved += bytes;
        schedule.record(bytes);

        let ceiling = self.plan.max_source_size;
        let compacted = self.plan.compact_source && schedule.is_due(ceiling, last_round);
        if compacted {
            self.source.compact()?;
            stats.compactions += 1;
        }

        let size = self.measure_source()?;
        stats.final_source_size = size;
        if compacted {
            schedule.compacted(size);
        }

        let report = RoundReport {
            round: stats.rounds,
            entries: staged.entries,
            total_moved: stats.entries_moved,
            compacted,
            source_size: size,
            max_source_size: ceiling,
        };

        info!(
            round = report.round,
            entries = report.entries,
            moved = report.total_moved,
            compacted = report.compacted,
            size = report.source_size,
            ceiling = report.max_source_size,
            "round committed"
        );
        on_round(&report);

        staged.clear();
        Ok(size)
    }

    fn measure_source(&self) -> Result<u64> {
        let size = self.probe.measure(self.source.root())?;
        debug!(size, "probed source size");
        Ok(size)
    }
}

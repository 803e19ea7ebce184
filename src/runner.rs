//! Mode runner
//!
//! Wires a validated [`Config`] to the size probe (stats mode) or to two
//! stores and the migration engine (migration mode), writing the
//! human-readable report to `out`.

use std::io::{self, Write};

use tracing::info;

use crate::config::{Config, MigrationSettings, RunMode};
use crate::error::Result;
use crate::migrate::{Migrator, Outcome};
use crate::probe::directory_size;
use crate::store::Store;

/// Run whichever mode `config` selects
pub fn run(config: &Config, out: &mut dyn Write) -> Result<Option<Outcome>> {
    match config.mode()? {
        RunMode::Stats { source_dir } => {
            let size = directory_size(&source_dir)?;
            writeln!(out, "Size {}", size)?;
            Ok(None)
        }
        RunMode::Migrate(settings) => migrate(&settings, out).map(Some),
    }
}

/// Open both stores, migrate, and close them again
///
/// The stores are closed on every exit path: explicitly on success, by
/// their `Drop` impl when an error unwinds out of this function.
pub fn migrate(settings: &MigrationSettings, out: &mut dyn Write) -> Result<Outcome> {
    writeln!(
        out,
        "Config: source={} target={} max size={} batch size={} compact={}",
        settings.source_dir.display(),
        settings.target_dir.display(),
        settings.plan.max_source_size,
        settings.plan.batch_size,
        settings.plan.compact_source
    )?;

    // The source must already exist; the target is created on demand
    let source = Store::open(
        &settings.source_dir,
        settings.store_options.clone().create_if_missing(false),
    )?;
    let target = Store::open(&settings.target_dir, settings.store_options.clone())?;

    let migrator = Migrator::new(&source, &target, settings.plan.clone());

    let mut report_error: Option<io::Error> = None;
    let outcome = migrator.run_with(|report| {
        if report_error.is_none() {
            if let Err(e) = writeln!(
                out,
                "Size: {}, target size: {}",
                report.source_size, report.max_source_size
            ) {
                report_error = Some(e);
            }
        }
    })?;

    if let Some(e) = report_error {
        return Err(e.into());
    }

    source.close()?;
    target.close()?;

    let stats = outcome.stats();
    match &outcome {
        Outcome::TargetReached(_) => writeln!(
            out,
            "Target size reached: {} bytes after moving {} entries in {} rounds",
            stats.final_source_size, stats.entries_moved, stats.rounds
        )?,
        Outcome::SourceDrained(_) => writeln!(
            out,
            "Source drained before reaching target size: {} bytes after moving {} entries in {} rounds",
            stats.final_source_size, stats.entries_moved, stats.rounds
        )?,
    }
    writeln!(out, "DONE")?;

    info!(
        rounds = stats.rounds,
        moved = stats.entries_moved,
        bytes = stats.bytes_moved,
        compactions = stats.compactions,
        "migration finished"
    );

    Ok(outcome)
}

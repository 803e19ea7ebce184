//! kvshrink binary
//!
//! Reports the size of a store, or shrinks it by moving entries into a
//! second store.

use std::path::PathBuf;

use clap::Parser;
use kvshrink::config::{Config, DEFAULT_BATCH_SIZE};
use tracing_subscriber::{fmt, EnvFilter};

/// Largest memtable limit whose byte count fits a 32-bit usize
const MAX_MEMTABLE_MB: u64 = 4095;

/// Shrink a key-value store by relocating entries into another store
#[derive(Parser, Debug)]
#[command(name = "kvshrink")]
#[command(about = "Move entries out of an oversized key-value store in batches")]
#[command(version)]
struct Args {
    /// Display stats of source storage
    #[arg(short = 'u', long = "stat")]
    stats: bool,

    /// Path to source storage
    #[arg(short = 's', long = "sourcedir")]
    source_dir: PathBuf,

    /// Max size of source storage in bytes
    #[arg(short = 'm', long = "maxsize", default_value_t = 0)]
    max_size: u64,

    /// Path to target storage
    #[arg(short = 't', long = "targetdir")]
    target_dir: Option<PathBuf>,

    /// Batch size of moving
    #[arg(short = 'b', long = "batchsize", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Skip compacting the source during the run
    #[arg(long)]
    no_compact: bool,

    /// MemTable size limit in MB before flush (1 to 4095)
    #[arg(
        long,
        default_value_t = 4,
        value_parser = clap::value_parser!(u64).range(1..=MAX_MEMTABLE_MB)
    )]
    memtable_mb: u64,
}

fn main() {
    // Logs go to stderr; stdout carries the report
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kvshrink=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("kvshrink v{}", kvshrink::VERSION);

    let mut builder = Config::builder()
        .stats(args.stats)
        .source_dir(&args.source_dir)
        .max_size(args.max_size)
        .batch_size(args.batch_size)
        .compact_source(!args.no_compact)
        .memtable_size_limit(args.memtable_mb as usize * 1024 * 1024);
    if let Some(target_dir) = &args.target_dir {
        builder = builder.target_dir(target_dir);
    }
    let config = builder.build();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Err(e) = kvshrink::runner::run(&config, &mut out) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

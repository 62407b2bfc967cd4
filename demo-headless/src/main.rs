//! Headless distributed wildfire simulation driver
//!
//! Spawns one worker thread per rank over a channel mesh, runs the full
//! simulation, and optionally persists gathered grid snapshots as JSON for
//! external visualization.

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Instant;
use tracing::{error, info};
use wildfire_sim_core::{
    AssembledGrid, ChannelTransport, FirePlacement, RunSummary, SimConfig, Transport,
    WildfireSimulation,
};

/// Distributed wildfire simulation demo
#[derive(Parser, Debug)]
#[command(name = "wildfire-demo")]
#[command(about = "Row-partitioned wildfire simulation with dynamic load balancing", long_about = None)]
struct Args {
    /// Total rows of the global grid
    #[arg(long, default_value_t = 100)]
    rows: usize,

    /// Total columns of the global grid
    #[arg(long, default_value_t = 100)]
    cols: usize,

    /// Simulation steps
    #[arg(long, default_value_t = 100)]
    steps: usize,

    /// Number of cooperating workers
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Enable dynamic load balancing
    #[arg(long)]
    balance: bool,

    /// Steps between load balancing rounds
    #[arg(long, default_value_t = 5)]
    balance_interval: usize,

    /// Burn synthetic CPU time proportional to fire activity
    #[arg(long)]
    heavy: bool,

    /// Initial fire position
    #[arg(long, value_enum, default_value_t = FirePos::Center)]
    fire_pos: FirePos,

    /// Base RNG seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Save grid snapshots for visualization
    #[arg(long)]
    save: bool,

    /// Directory for snapshot files
    #[arg(long, default_value = "results/logs")]
    out_dir: PathBuf,

    /// Steps between burning-total diagnostics
    #[arg(long, default_value_t = 10)]
    log_interval: usize,

    /// Steps between saved snapshots (with --save)
    #[arg(long, default_value_t = 10)]
    snapshot_interval: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FirePos {
    Center,
    Top,
}

impl From<FirePos> for FirePlacement {
    fn from(pos: FirePos) -> Self {
        match pos {
            FirePos::Center => FirePlacement::Center,
            FirePos::Top => FirePlacement::Top,
        }
    }
}

/// A snapshot that could not be written.
#[derive(Debug)]
enum PersistenceError {
    SerializeFailed(String),
    SaveFailed(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerializeFailed(reason) => write!(f, "failed to serialize snapshot: {reason}"),
            Self::SaveFailed(reason) => write!(f, "failed to write snapshot: {reason}"),
        }
    }
}

impl Error for PersistenceError {}

fn save_snapshot(out_dir: &Path, step: usize, grid: &AssembledGrid) -> Result<(), PersistenceError> {
    let contents = serde_json::to_string(grid)
        .map_err(|e| PersistenceError::SerializeFailed(e.to_string()))?;
    let path = out_dir.join(format!("step_{step:03}.json"));
    fs::write(path, contents).map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;
    Ok(())
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if args.workers == 0 {
        return Err("at least one worker is required".into());
    }

    let config = SimConfig {
        total_rows: args.rows,
        total_cols: args.cols,
        steps: args.steps,
        seed: args.seed,
        balance_interval: args.balance.then_some(args.balance_interval),
        heavy_load: args.heavy,
        fire_placement: args.fire_pos.into(),
        diagnostic_interval: args.log_interval,
        snapshot_interval: args.save.then_some(args.snapshot_interval),
        ..SimConfig::default()
    };
    config.validate()?;

    if args.save {
        fs::create_dir_all(&args.out_dir)?;
    }

    let started = Instant::now();
    let mesh = ChannelTransport::mesh(args.workers);
    let results: Vec<Result<RunSummary, Box<dyn Error + Send + Sync>>> =
        thread::scope(|scope| {
            let handles: Vec<_> = mesh
                .into_iter()
                .map(|transport| {
                    let config = config.clone();
                    let out_dir = &args.out_dir;
                    let save = args.save;
                    scope.spawn(move || -> Result<RunSummary, Box<dyn Error + Send + Sync>> {
                        let rank = transport.rank();
                        let mut sim = WildfireSimulation::new(config, transport)?;
                        let summary = sim.run_with_snapshots(|step, grid| {
                            // Only rank 0 ever receives gathered grids
                            if save {
                                if let Err(err) = save_snapshot(out_dir, step, grid) {
                                    error!(step, rank, "{err}");
                                }
                            }
                        })?;
                        Ok(summary)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err("worker thread panicked".into()),
                })
                .collect()
        });

    let mut final_rows = Vec::with_capacity(args.workers);
    let mut total_burning = None;
    for (rank, result) in results.into_iter().enumerate() {
        let summary = result.map_err(|err| format!("rank {rank}: {err}"))?;
        final_rows.push(summary.final_rows);
        if rank == 0 {
            total_burning = summary.total_burning;
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        workers = args.workers,
        ?final_rows,
        total_burning,
        "simulation completed in {elapsed:.4} seconds"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!("{err}");
        process::exit(1);
    }
}

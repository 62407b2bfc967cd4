//! Driver loop tying transport, stencil, and balancer together
//!
//! One [`WildfireSimulation`] instance runs per worker. Each step is:
//! halo exchange, stencil update, commit, then (on cadence) a load
//! balancing round and diagnostics. The ordering is a contract: the
//! stencil only reads halo edges after the exchange completes, and the
//! balancer only runs against committed state.

use crate::balance::{LoadBalancer, RedistributeOutcome};
use crate::core_types::{
    row_offset, row_split, ConfigError, FirePlacement, SimConfig, MIN_PARTITION_ROWS,
};
use crate::grid::Partition;
use crate::spread::{step_spread, SpreadParams, SpreadStats};
use crate::transport::{AssembledGrid, CommError, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

/// What one simulation step did on this worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Zero-based index of the completed step.
    pub step: usize,
    /// Local fire activity during the stencil update.
    pub stats: SpreadStats,
    /// Row migrations applied by the balancer this step.
    pub migrations: RedistributeOutcome,
}

/// Summary returned after the full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps executed.
    pub steps: usize,
    /// Final local row count (may differ from the initial split).
    pub final_rows: usize,
    /// Global burning-cell count after the last step; rank 0 only.
    pub total_burning: Option<u64>,
}

/// Per-worker simulation state and loop.
#[derive(Debug)]
pub struct WildfireSimulation<T: Transport> {
    config: SimConfig,
    transport: T,
    partition: Partition,
    params: SpreadParams,
    balancer: LoadBalancer,
    rng: StdRng,
    step_index: usize,
}

impl<T: Transport> WildfireSimulation<T> {
    /// Set up this worker's band of the global grid and place the initial
    /// fire.
    ///
    /// Rows are split as evenly as possible, the first `total mod size`
    /// ranks getting one extra. Each rank's random stream is seeded with
    /// `seed + rank`. `Center` placement ignites the single globally
    /// centered cell on whichever rank initially owns it; `Top` ignites
    /// the horizontally centered cell of rank 0's first row.
    ///
    /// # Errors
    ///
    /// Rejects invalid configurations, including grids too small to give
    /// every worker a row (or, with balancing enabled, the minimum two
    /// rows).
    pub fn new(config: SimConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let workers = transport.size();
        let undersized = config.total_rows < workers
            || (config.balance_interval.is_some()
                && config.total_rows < MIN_PARTITION_ROWS * workers);
        if undersized {
            return Err(ConfigError::TooFewRows {
                total_rows: config.total_rows,
                workers,
            });
        }

        let rank = transport.rank();
        let rows = row_split(config.total_rows, workers, rank);
        let offset = row_offset(config.total_rows, workers, rank);
        let mut partition = Partition::new(rows, config.total_cols);

        match config.fire_placement {
            FirePlacement::Center => {
                let center_row = config.total_rows / 2;
                if (offset..offset + rows).contains(&center_row) {
                    partition.set_fire(center_row - offset, config.total_cols / 2);
                }
            }
            FirePlacement::Top => {
                if offset == 0 {
                    partition.set_fire(0, config.total_cols / 2);
                }
            }
        }

        let params = SpreadParams {
            p_ignite: config.p_ignite,
            p_spread: config.p_spread,
            heavy_load: config.heavy_load,
        };
        let rng = StdRng::seed_from_u64(config.seed.wrapping_add(rank as u64));

        Ok(Self {
            config,
            transport,
            partition,
            params,
            balancer: LoadBalancer::new(),
            rng,
            step_index: 0,
        })
    }

    /// The local partition.
    #[must_use]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The underlying transport endpoint.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one step: exchange halos, update, commit, balance on cadence.
    ///
    /// # Errors
    ///
    /// Any detected communication failure aborts the run.
    pub fn step(&mut self) -> Result<StepReport, CommError> {
        let pending = self.transport.begin_halo_exchange(&self.partition)?;
        self.transport
            .finish_halo_exchange(pending, &mut self.partition)?;

        let (next, stats) = step_spread(&self.partition, &self.params, &mut self.rng);
        self.partition.commit(next);

        let mut migrations = RedistributeOutcome::default();
        if let Some(interval) = self.config.balance_interval {
            if self.step_index % interval == 0 {
                migrations = self
                    .balancer
                    .redistribute(&self.transport, &mut self.partition)?;
            }
        }

        let step = self.step_index;
        self.step_index += 1;
        Ok(StepReport {
            step,
            stats,
            migrations,
        })
    }

    /// Run the configured number of steps with periodic diagnostics but
    /// without snapshot gathering.
    ///
    /// # Errors
    ///
    /// Any detected communication failure aborts the run.
    pub fn run(&mut self) -> Result<RunSummary, CommError> {
        self.run_with_snapshots(|_, _| {})
    }

    /// Run the configured number of steps. On the diagnostic cadence the
    /// global burning count is reduced to rank 0 and logged there; on the
    /// snapshot cadence (if configured) the full grid is gathered to rank 0
    /// and handed to `sink(step, grid)` there.
    ///
    /// # Errors
    ///
    /// Any detected communication failure aborts the run.
    pub fn run_with_snapshots<F>(&mut self, mut sink: F) -> Result<RunSummary, CommError>
    where
        F: FnMut(usize, &AssembledGrid),
    {
        for _ in 0..self.config.steps {
            let report = self.step()?;

            if report.step % self.config.diagnostic_interval == 0 {
                let local = self.partition.burning_count();
                if let Some(total) = self.transport.reduce_sum(local, 0)? {
                    info!(step = report.step, total_burning = total, "diagnostics");
                }
            }

            if let Some(interval) = self.config.snapshot_interval {
                if report.step % interval == 0 {
                    if let Some(grid) = self.transport.gather_rows(&self.partition, 0)? {
                        sink(report.step, &grid);
                    }
                }
            }
        }

        let total_burning = self
            .transport
            .reduce_sum(self.partition.burning_count(), 0)?;
        Ok(RunSummary {
            steps: self.config.steps,
            final_rows: self.partition.rows(),
            total_burning,
        })
    }
}

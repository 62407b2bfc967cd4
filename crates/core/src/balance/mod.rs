//! Dynamic load balancing by whole-row migration
//!
//! Every configured interval the balancer equalizes burning-cell counts
//! between row-adjacent partitions. No worker ever sees global state: each
//! boundary is settled by a pairwise rendezvous, and a two-phase parity
//! schedule assigns initiator/responder roles so that no two boundaries
//! can form a circular wait.

pub mod pair;

pub use pair::{PairOutcome, PairRole, PairState};

use crate::core_types::{BALANCE_THRESHOLD, MIN_PARTITION_ROWS};
use crate::grid::Partition;
use crate::transport::{CommError, Transport};
use tracing::debug;

/// Net effect of one redistribution round on the local partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedistributeOutcome {
    /// Rows migrated away this round.
    pub rows_given: usize,
    /// Rows migrated in this round.
    pub rows_taken: usize,
}

impl RedistributeOutcome {
    /// Whether any migration touched the local partition (halo state is
    /// invalid and has already been rebuilt if so).
    #[must_use]
    pub fn changed(&self) -> bool {
        self.rows_given > 0 || self.rows_taken > 0
    }

    fn absorb(&mut self, pair: PairOutcome) {
        self.rows_given += usize::from(pair.gave_row);
        self.rows_taken += usize::from(pair.took_row);
    }
}

/// Row-migration load balancer over a chain of workers.
#[derive(Debug, Clone, Copy)]
pub struct LoadBalancer {
    threshold: u64,
    min_rows: usize,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self {
            threshold: BALANCE_THRESHOLD,
            min_rows: MIN_PARTITION_ROWS,
        }
    }
}

impl LoadBalancer {
    /// Balancer with the standard threshold and minimum partition size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Balancer with a custom imbalance threshold (tests and experiments).
    #[must_use]
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Run one redistribution round. Executed identically by every worker;
    /// all workers must call it in the same step or the collective blocks.
    ///
    /// Sequence: a barrier to establish a synchronized measurement point,
    /// then phase 1 (even ranks initiate toward their down-neighbor, odd
    /// ranks respond to their up-neighbor), a barrier, then phase 2 (odd
    /// ranks initiate downward, even ranks other than 0 respond upward).
    /// With fewer than two workers the round is skipped entirely.
    ///
    /// # Errors
    ///
    /// Fails if a peer's endpoint is gone or the peer violates the
    /// rendezvous protocol. Either aborts the run (crash-stop).
    pub fn redistribute<T: Transport + ?Sized>(
        &self,
        transport: &T,
        partition: &mut Partition,
    ) -> Result<RedistributeOutcome, CommError> {
        let mut outcome = RedistributeOutcome::default();
        if transport.size() < 2 {
            return Ok(outcome);
        }

        // No worker may measure a neighbor's pre-step load against its
        // own post-step load.
        transport.barrier();

        let rank = transport.rank();

        // Phase 1: even ranks initiate with their down-neighbor
        if rank % 2 == 0 {
            if let Some(down) = transport.down() {
                outcome.absorb(self.run_pair(transport, partition, down, PairRole::Initiator)?);
            }
        } else if let Some(up) = transport.up() {
            outcome.absorb(self.run_pair(transport, partition, up, PairRole::Responder)?);
        }

        transport.barrier();

        // Phase 2: odd ranks initiate with their down-neighbor
        if rank % 2 == 1 {
            if let Some(down) = transport.down() {
                outcome.absorb(self.run_pair(transport, partition, down, PairRole::Initiator)?);
            }
        } else if rank != 0 {
            if let Some(up) = transport.up() {
                outcome.absorb(self.run_pair(transport, partition, up, PairRole::Responder)?);
            }
        }

        if outcome.changed() {
            debug!(
                rank,
                given = outcome.rows_given,
                taken = outcome.rows_taken,
                rows = partition.rows(),
                "partition resized by load balancing"
            );
        }
        Ok(outcome)
    }

    fn run_pair<T: Transport + ?Sized>(
        &self,
        transport: &T,
        partition: &mut Partition,
        neighbor: usize,
        role: PairRole,
    ) -> Result<PairOutcome, CommError> {
        pair::run_pair(
            transport,
            partition,
            neighbor,
            role,
            self.threshold,
            self.min_rows,
        )
    }
}

//! Stencil engine: the per-cell fire spread rule
//!
//! Pure function from the current partition state (including halo rows) to
//! the next interior state. Burning cells always burn out, burnt cells stay
//! burnt, and fuel cells ignite either spontaneously or from burning
//! von Neumann neighbors. Each burning neighbor is an independent Bernoulli
//! trial with success probability `p_spread`, so the aggregate ignition
//! probability for `k` burning neighbors is `1 - (1 - p_spread)^k`.
//!
//! One uniform draw is consumed per cell, in row-major order, regardless of
//! the cell's state; for a fixed seed and partition shape the produced grid
//! is bit-identical across runs.

use crate::core_types::{CellState, HEAVY_LOAD_COST, P_IGNITE, P_SPREAD};
use crate::grid::Partition;
use rand::Rng;
use std::time::Instant;

/// Parameters of the spread rule, fixed for the run.
#[derive(Debug, Clone, Copy)]
pub struct SpreadParams {
    /// Spontaneous ignition probability per fuel cell per step.
    pub p_ignite: f64,
    /// Per-burning-neighbor spread probability.
    pub p_spread: f64,
    /// Burn synthetic CPU time proportional to fire activity.
    pub heavy_load: bool,
}

impl Default for SpreadParams {
    fn default() -> Self {
        Self {
            p_ignite: P_IGNITE,
            p_spread: P_SPREAD,
            heavy_load: false,
        }
    }
}

/// Fire activity observed during one stencil step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpreadStats {
    /// Cells that were burning in the current state.
    pub burning: u64,
    /// Fuel cells that ignited this step.
    pub ignited: u64,
}

/// Probability that at least one of `k` burning neighbors ignites a fuel
/// cell: the complement of all `k` independent trials failing.
#[must_use]
pub fn neighbor_ignition_probability(p_spread: f64, k: u32) -> f64 {
    1.0 - (1.0 - p_spread).powi(k as i32)
}

/// Compute the next interior state from the current state plus halo.
///
/// Halo edge rows must have been refreshed by a completed exchange for this
/// step (or be the permanent `Fuel` rows of the global domain edge). There
/// is no lateral wraparound: the left/right grid edges have no neighbors
/// beyond them.
///
/// In heavy-load mode, burns [`HEAVY_LOAD_COST`] of CPU per burning cell
/// and per newly ignited cell after the state is computed; this makes the
/// load metric correlate with compute cost and has no effect on the result.
pub fn step_spread<R: Rng + ?Sized>(
    partition: &Partition,
    params: &SpreadParams,
    rng: &mut R,
) -> (Vec<CellState>, SpreadStats) {
    let rows = partition.rows();
    let cols = partition.cols();
    let mut next = Vec::with_capacity(rows * cols);
    let mut stats = SpreadStats::default();

    for r in 0..rows {
        let halo_r = r + 1;
        for c in 0..cols {
            // One draw per cell keeps the stream aligned with the
            // partition shape alone, not with the fire's progress.
            let draw: f64 = rng.random();

            let state = match partition.get(r, c) {
                CellState::Burning => {
                    stats.burning += 1;
                    CellState::Burnt
                }
                CellState::Burnt => CellState::Burnt,
                CellState::Fuel => {
                    let mut k = 0u32;
                    k += u32::from(partition.halo_at(halo_r - 1, c).is_burning());
                    k += u32::from(partition.halo_at(halo_r + 1, c).is_burning());
                    if c > 0 {
                        k += u32::from(partition.halo_at(halo_r, c - 1).is_burning());
                    }
                    if c + 1 < cols {
                        k += u32::from(partition.halo_at(halo_r, c + 1).is_burning());
                    }

                    let spontaneous = draw < params.p_ignite;
                    let spread = k > 0 && draw < neighbor_ignition_probability(params.p_spread, k);
                    if spontaneous || spread {
                        stats.ignited += 1;
                        CellState::Burning
                    } else {
                        CellState::Fuel
                    }
                }
            };
            next.push(state);
        }
    }

    if params.heavy_load {
        burn_synthetic_load(stats.burning + stats.ignited);
    }

    (next, stats)
}

/// Busy-spin for [`HEAVY_LOAD_COST`] per active cell.
fn burn_synthetic_load(active_cells: u64) {
    if active_cells == 0 {
        return;
    }
    let deadline = Instant::now() + HEAVY_LOAD_COST * u32::try_from(active_cells).unwrap_or(u32::MAX);
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

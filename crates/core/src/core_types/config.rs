//! Simulation configuration and protocol constants
//!
//! All tunable parameters are collected in [`SimConfig`], validated once
//! before the run starts. Protocol-wide constants (balance threshold,
//! minimum partition size, synthetic load cost) are fixed for the run and
//! never mutated.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Default probability of spontaneous ignition per fuel cell per step.
pub const P_IGNITE: f64 = 0.01;

/// Default probability that one burning neighbor ignites a fuel cell.
pub const P_SPREAD: f64 = 0.5;

/// Load difference (in burning cells) that must be exceeded before a row
/// migrates between neighboring partitions.
pub const BALANCE_THRESHOLD: u64 = 5;

/// A partition never shrinks below this many rows.
pub const MIN_PARTITION_ROWS: usize = 2;

/// Synthetic CPU cost per burning/igniting cell in heavy-load mode.
pub const HEAVY_LOAD_COST: Duration = Duration::from_micros(50);

/// Where the initial fire is placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirePlacement {
    /// Ignite the single globally-centered cell.
    #[default]
    Center,
    /// Ignite the horizontally-centered cell of the topmost row band.
    Top,
}

/// Immutable run configuration, constructed once and passed explicitly to
/// each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Total rows of the global grid, split into contiguous bands.
    pub total_rows: usize,
    /// Columns, identical for every partition and fixed for the run.
    pub total_cols: usize,
    /// Number of simulation steps to run.
    pub steps: usize,
    /// Base RNG seed; each rank derives its stream from `seed + rank`.
    pub seed: u64,
    /// Spontaneous ignition probability.
    pub p_ignite: f64,
    /// Per-neighbor spread probability.
    pub p_spread: f64,
    /// Dynamic load balancing cadence in steps, `None` to disable.
    pub balance_interval: Option<usize>,
    /// Burn synthetic CPU time proportional to fire activity.
    pub heavy_load: bool,
    /// Initial fire placement mode.
    pub fire_placement: FirePlacement,
    /// Cadence for the burning-cell sum reduction to rank 0.
    pub diagnostic_interval: usize,
    /// Cadence for gathering the full grid to rank 0, `None` to disable.
    pub snapshot_interval: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_rows: 100,
            total_cols: 100,
            steps: 100,
            seed: 0,
            p_ignite: P_IGNITE,
            p_spread: P_SPREAD,
            balance_interval: None,
            heavy_load: false,
            fire_placement: FirePlacement::Center,
            diagnostic_interval: 10,
            snapshot_interval: None,
        }
    }
}

impl SimConfig {
    /// Reject invalid configurations before any process starts working.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-positive dimensions or step counts,
    /// probabilities outside `[0, 1]`, or a zero cadence.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_rows == 0 || self.total_cols == 0 {
            return Err(ConfigError::ZeroDimension {
                rows: self.total_rows,
                cols: self.total_cols,
            });
        }
        if self.steps == 0 {
            return Err(ConfigError::ZeroSteps);
        }
        for (name, p) in [("p_ignite", self.p_ignite), ("p_spread", self.p_spread)] {
            if !(0.0..=1.0).contains(&p) || p.is_nan() {
                return Err(ConfigError::InvalidProbability { name, value: p });
            }
        }
        if self.balance_interval == Some(0)
            || self.snapshot_interval == Some(0)
            || self.diagnostic_interval == 0
        {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Rows owned by `rank` under the initial even split: every rank gets
/// `total_rows / size`, and the first `total_rows % size` ranks one extra.
#[must_use]
pub fn row_split(total_rows: usize, size: usize, rank: usize) -> usize {
    let base = total_rows / size;
    let remainder = total_rows % size;
    base + usize::from(rank < remainder)
}

/// Global index of the first row owned by `rank` under the initial split.
///
/// Only meaningful before any row migration; the core deliberately does not
/// track global offsets once partitions start resizing.
#[must_use]
pub fn row_offset(total_rows: usize, size: usize, rank: usize) -> usize {
    let base = total_rows / size;
    let remainder = total_rows % size;
    rank * base + rank.min(remainder)
}

/// A configuration rejected before the simulation starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Grid dimensions must both be positive.
    ZeroDimension {
        /// Requested total rows.
        rows: usize,
        /// Requested total columns.
        cols: usize,
    },
    /// Step count must be positive.
    ZeroSteps,
    /// A probability was outside `[0, 1]`.
    InvalidProbability {
        /// Which parameter was invalid.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A cadence (balance/diagnostic/snapshot interval) was zero.
    ZeroInterval,
    /// The grid cannot give every worker its minimum rows.
    TooFewRows {
        /// Requested total rows.
        total_rows: usize,
        /// Number of cooperating workers.
        workers: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDimension { rows, cols } => {
                write!(f, "grid dimensions must be positive, got {rows}x{cols}")
            }
            Self::ZeroSteps => write!(f, "step count must be positive"),
            Self::InvalidProbability { name, value } => {
                write!(f, "{name} must be within [0, 1], got {value}")
            }
            Self::ZeroInterval => write!(f, "intervals must be positive when set"),
            Self::TooFewRows { total_rows, workers } => write!(
                f,
                "{total_rows} rows cannot give {workers} workers {MIN_PARTITION_ROWS} rows each"
            ),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let config = SimConfig {
            total_rows: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDimension { .. })
        ));

        let config = SimConfig {
            total_cols: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_steps() {
        let config = SimConfig {
            steps: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSteps));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let config = SimConfig {
            p_spread: 1.5,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability {
                name: "p_spread",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_intervals() {
        let config = SimConfig {
            balance_interval: Some(0),
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn row_split_distributes_remainder_to_first_ranks() {
        // 10 rows over 3 ranks: 4, 3, 3
        assert_eq!(row_split(10, 3, 0), 4);
        assert_eq!(row_split(10, 3, 1), 3);
        assert_eq!(row_split(10, 3, 2), 3);
    }

    #[test]
    fn row_split_sums_to_total() {
        for size in 1..=7 {
            for total in size..50 {
                let sum: usize = (0..size).map(|r| row_split(total, size, r)).sum();
                assert_eq!(sum, total, "total {total} over {size} ranks");
            }
        }
    }

    #[test]
    fn row_offsets_are_prefix_sums() {
        for size in 1..=5 {
            for total in size..40 {
                let mut expected = 0;
                for rank in 0..size {
                    assert_eq!(row_offset(total, size, rank), expected);
                    expected += row_split(total, size, rank);
                }
            }
        }
    }
}

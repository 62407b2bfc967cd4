//! Core types and run-wide constants

pub mod cell;
pub mod config;

pub use cell::CellState;
pub use config::{
    row_offset, row_split, ConfigError, FirePlacement, SimConfig, BALANCE_THRESHOLD,
    HEAVY_LOAD_COST, MIN_PARTITION_ROWS, P_IGNITE, P_SPREAD,
};

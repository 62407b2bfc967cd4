//! Cell states for the wildfire cellular automaton
//!
//! Every cell of the simulated landscape is in exactly one of three states.
//! Transitions are monotone: `Fuel` may ignite into `Burning`, every
//! `Burning` cell decays into `Burnt` on the next step, and `Burnt` is
//! terminal.

use serde::{Deserialize, Serialize};

/// State of one landscape cell.
///
/// The discriminants double as the wire/snapshot encoding
/// (0 = fuel, 1 = burning, 2 = burnt), so reassembled grids can be
/// persisted as plain integer arrays.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// Unburnt vegetation, susceptible to ignition.
    #[default]
    Fuel = 0,
    /// Actively burning this step; becomes `Burnt` on the next step.
    Burning = 1,
    /// Consumed. Terminal state, never leaves it.
    Burnt = 2,
}

impl CellState {
    /// Integer code used in snapshots and migrated row payloads.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a snapshot integer back into a cell state.
    ///
    /// Returns `None` for codes outside {0, 1, 2}.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Fuel),
            1 => Some(Self::Burning),
            2 => Some(Self::Burnt),
            _ => None,
        }
    }

    /// Whether this cell is actively burning.
    #[must_use]
    pub fn is_burning(self) -> bool {
        self == Self::Burning
    }
}

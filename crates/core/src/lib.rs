//! Distributed Wildfire Simulation Core
//!
//! Simulates wildfire spread on a 2D cellular grid partitioned into
//! contiguous row bands across cooperating workers. Each worker exclusively
//! owns one band plus a one-row halo margin; all coordination is explicit
//! message passing over a linear chain topology.
//!
//! The three load-bearing pieces:
//! - halo/ghost-row exchange keeping boundary rows consistent across
//!   workers ([`transport`])
//! - dynamic load balancing that migrates whole rows between neighboring
//!   partitions without deadlock ([`balance`])
//! - the per-cell fire spread stencil the exchanged state feeds ([`spread`])
//!
//! [`simulation::WildfireSimulation`] wires them into the per-step driver
//! loop.

// Core types and run-wide constants
pub mod core_types;

// Local grid storage
pub mod grid;

// Message passing between workers
pub mod transport;

// Stencil engine
pub mod spread;

// Dynamic load balancing
pub mod balance;

// Driver loop
pub mod simulation;

// Re-export core types
pub use core_types::{CellState, ConfigError, FirePlacement, SimConfig};

// Re-export the main working set
pub use balance::{LoadBalancer, RedistributeOutcome};
pub use grid::{HaloEdge, Partition};
pub use simulation::{RunSummary, StepReport, WildfireSimulation};
pub use spread::{step_spread, SpreadParams, SpreadStats};
pub use transport::{
    AssembledGrid, ChannelTransport, CommError, LoopbackTransport, Message, Tag, Transport,
};

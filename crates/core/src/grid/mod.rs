//! Local grid storage: row-band partitions with halo margins

pub mod partition;

pub use partition::{HaloEdge, Partition};

//! Single-worker transport with immediate completion
//!
//! Used for single-worker runs and for unit-testing the stencil engine and
//! load balancer in isolation. There are no neighbors, so halo exchange is
//! a no-op (edge ghost rows stay `Fuel`, the closed-boundary condition),
//! the barrier returns immediately, and both collectives reduce to the
//! local value.

use super::{CommError, Message, Tag, Transport};

/// Transport for a world of exactly one worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackTransport;

impl Transport for LoopbackTransport {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, dest: usize, _tag: Tag, _message: Message) -> Result<(), CommError> {
        // No peers exist; any point-to-point traffic is a protocol bug.
        Err(CommError::NoRoute { rank: dest })
    }

    fn recv(&self, src: usize, _tag: Tag) -> Result<Message, CommError> {
        Err(CommError::NoRoute { rank: src })
    }

    fn barrier(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Partition;

    #[test]
    fn has_no_neighbors() {
        let transport = LoopbackTransport;
        assert_eq!(transport.up(), None);
        assert_eq!(transport.down(), None);
    }

    #[test]
    fn halo_exchange_is_a_no_op() {
        let transport = LoopbackTransport;
        let mut partition = Partition::new(3, 3);
        partition.set_fire(0, 0);

        let pending = transport.begin_halo_exchange(&partition).unwrap();
        transport.finish_halo_exchange(pending, &mut partition).unwrap();

        // Ghost rows untouched: closed boundary at the domain edge
        for c in 0..3 {
            assert_eq!(partition.halo_at(0, c), crate::core_types::CellState::Fuel);
            assert_eq!(partition.halo_at(4, c), crate::core_types::CellState::Fuel);
        }
    }

    #[test]
    fn reduce_returns_local_value() {
        let transport = LoopbackTransport;
        assert_eq!(transport.reduce_sum(42, 0).unwrap(), Some(42));
    }

    #[test]
    fn gather_returns_own_partition() {
        let transport = LoopbackTransport;
        let mut partition = Partition::new(2, 2);
        partition.set_fire(1, 1);

        let grid = transport.gather_rows(&partition, 0).unwrap().unwrap();
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.cols, 2);
        assert_eq!(grid.codes, vec![0, 0, 0, 1]);
    }

    #[test]
    fn point_to_point_is_rejected() {
        let transport = LoopbackTransport;
        assert_eq!(
            transport.send(1, Tag::Load, Message::Value(0)),
            Err(CommError::NoRoute { rank: 1 })
        );
    }
}

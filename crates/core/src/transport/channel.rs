//! Channel-backed transport for multi-worker runs
//!
//! One [`ChannelTransport`] endpoint per worker, built together as a mesh.
//! Every ordered (sender, receiver) pair gets one unbounded lane per tag, so
//! tag matching is structural: a receive for `(src, tag)` can only ever see
//! messages sent to this rank under that tag, in send order. Sends buffer
//! and never block, which is what lets `begin_halo_exchange` issue both
//! directions before any receive completes.
//!
//! Workers are expected to run one per thread and share nothing besides
//! their endpoints. A dropped endpoint (worker panic or early exit)
//! disconnects its lanes; peers observe that as [`CommError::PeerGone`].

use super::{CommError, Message, Tag, Transport};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Barrier};

/// One worker's endpoint of a fully connected channel mesh.
pub struct ChannelTransport {
    rank: usize,
    size: usize,
    /// Outgoing lanes, keyed by (destination rank, tag).
    senders: FxHashMap<(usize, Tag), Sender<Message>>,
    /// Incoming lanes, keyed by (source rank, tag).
    receivers: FxHashMap<(usize, Tag), Receiver<Message>>,
    barrier: Arc<Barrier>,
}

impl ChannelTransport {
    /// Build a mesh of `size` endpoints, returned in rank order. Each
    /// endpoint is meant to move into its own worker thread.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn mesh(size: usize) -> Vec<ChannelTransport> {
        assert!(size > 0, "mesh needs at least one worker");
        let barrier = Arc::new(Barrier::new(size));

        let mut endpoints: Vec<ChannelTransport> = (0..size)
            .map(|rank| ChannelTransport {
                rank,
                size,
                senders: FxHashMap::default(),
                receivers: FxHashMap::default(),
                barrier: Arc::clone(&barrier),
            })
            .collect();

        for src in 0..size {
            for dest in 0..size {
                if src == dest {
                    continue;
                }
                for tag in Tag::ALL {
                    let (sender, receiver) = unbounded();
                    endpoints[src].senders.insert((dest, tag), sender);
                    endpoints[dest].receivers.insert((src, tag), receiver);
                }
            }
        }

        endpoints
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, message: Message) -> Result<(), CommError> {
        let lane = self
            .senders
            .get(&(dest, tag))
            .ok_or(CommError::NoRoute { rank: dest })?;
        lane.send(message)
            .map_err(|_| CommError::PeerGone { peer: dest })
    }

    fn recv(&self, src: usize, tag: Tag) -> Result<Message, CommError> {
        let lane = self
            .receivers
            .get(&(src, tag))
            .ok_or(CommError::NoRoute { rank: src })?;
        lane.recv().map_err(|_| CommError::PeerGone { peer: src })
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

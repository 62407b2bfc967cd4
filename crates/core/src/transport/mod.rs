//! Message passing between cooperating workers
//!
//! Workers are arranged in a linear chain by rank and share nothing; all
//! coordination goes through the [`Transport`] trait: blocking point-to-point
//! send/receive matched by tag, a global barrier, a variable-length gather to
//! one rank, and a sum reduction to one rank. Halo exchange and the
//! collectives are provided methods built on those primitives, so every
//! implementation gets identical protocol behavior.
//!
//! Failure model is crash-stop: there are no timeouts and nothing is
//! retried. A silently absent peer hangs the blocking call; a detectable
//! failure (disconnected endpoint, mistyped payload) surfaces as a
//! [`CommError`] and aborts the run.

pub mod channel;
pub mod loopback;
#[cfg(test)]
pub(crate) mod script;

pub use channel::ChannelTransport;
pub use loopback::LoopbackTransport;

use crate::core_types::CellState;
use crate::grid::{HaloEdge, Partition};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Message tags. A send and its matching receive must name the same tag.
///
/// Halo tags encode the direction a row travels along the chain, so a rank
/// sending to both neighbors at once can never cross its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Boundary row traveling down the chain (rank r to r + 1).
    HaloDown,
    /// Boundary row traveling up the chain (rank r to r - 1).
    HaloUp,
    /// Load report during a balancing rendezvous.
    Load,
    /// Balancing command from initiator to responder.
    Command,
    /// Migrated row payload.
    RowPayload,
    /// Row count announcement preceding a gather.
    GatherCount,
    /// Partition block for a gather.
    GatherData,
    /// Scalar contribution to a sum reduction.
    Reduce,
}

impl Tag {
    /// Every tag, in a fixed order. Channel meshes allocate one lane per tag.
    pub const ALL: [Tag; 8] = [
        Tag::HaloDown,
        Tag::HaloUp,
        Tag::Load,
        Tag::Command,
        Tag::RowPayload,
        Tag::GatherCount,
        Tag::GatherData,
        Tag::Reduce,
    ];
}

/// Command sent by a balancing initiator to its responder.
///
/// One command is always sent per rendezvous, even on a no-op, so the
/// message count per round stays symmetric and the blocking exchange stays
/// in lock-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCommand {
    /// "Take one row": a row payload from the initiator follows.
    TakeRow,
    /// "Give me one row": the responder must answer with a row payload.
    GiveRow,
    /// Loads are within threshold; nothing moves.
    NoChange,
}

/// Typed message payloads exchanged between workers.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One grid row (ghost exchange or migration payload).
    Row(Vec<CellState>),
    /// Load report: burning-cell count plus the sender's current row count.
    ///
    /// The row count lets an initiator avoid asking a minimum-size
    /// responder for a row it cannot give up.
    Load {
        /// Burning cells in the sender's partition.
        burning: u64,
        /// The sender's current row count.
        rows: usize,
    },
    /// Balancing command.
    Command(BalanceCommand),
    /// Row count for a gather.
    Count(usize),
    /// Encoded partition block for a gather (row-major cell codes).
    Block(Vec<u8>),
    /// Scalar for a reduction.
    Value(u64),
}

impl Message {
    /// Unpack a row payload.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::UnexpectedMessage`] for any other variant.
    pub fn into_row(self) -> Result<Vec<CellState>, CommError> {
        match self {
            Self::Row(row) => Ok(row),
            other => Err(CommError::unexpected("Row", &other)),
        }
    }

    /// Unpack a load report.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::UnexpectedMessage`] for any other variant.
    pub fn into_load(self) -> Result<(u64, usize), CommError> {
        match self {
            Self::Load { burning, rows } => Ok((burning, rows)),
            other => Err(CommError::unexpected("Load", &other)),
        }
    }

    /// Unpack a balancing command.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::UnexpectedMessage`] for any other variant.
    pub fn into_command(self) -> Result<BalanceCommand, CommError> {
        match self {
            Self::Command(command) => Ok(command),
            other => Err(CommError::unexpected("Command", &other)),
        }
    }

    /// Unpack a gather row count.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::UnexpectedMessage`] for any other variant.
    pub fn into_count(self) -> Result<usize, CommError> {
        match self {
            Self::Count(count) => Ok(count),
            other => Err(CommError::unexpected("Count", &other)),
        }
    }

    /// Unpack a gather block.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::UnexpectedMessage`] for any other variant.
    pub fn into_block(self) -> Result<Vec<u8>, CommError> {
        match self {
            Self::Block(block) => Ok(block),
            other => Err(CommError::unexpected("Block", &other)),
        }
    }

    /// Unpack a reduction scalar.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::UnexpectedMessage`] for any other variant.
    pub fn into_value(self) -> Result<u64, CommError> {
        match self {
            Self::Value(value) => Ok(value),
            other => Err(CommError::unexpected("Value", &other)),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Self::Row(_) => "Row",
            Self::Load { .. } => "Load",
            Self::Command(_) => "Command",
            Self::Count(_) => "Count",
            Self::Block(_) => "Block",
            Self::Value(_) => "Value",
        }
    }
}

/// A detected communication failure. Fatal; the run aborts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    /// The peer's endpoint is gone (worker terminated or panicked).
    PeerGone {
        /// Rank of the vanished peer.
        peer: usize,
    },
    /// No channel to the named rank (out of range, or self-send).
    NoRoute {
        /// The unreachable destination/source rank.
        rank: usize,
    },
    /// A received payload did not match the tag's expected variant.
    UnexpectedMessage {
        /// Variant the receiver required.
        expected: &'static str,
        /// Variant actually received.
        got: &'static str,
    },
    /// A peer violated the balancing protocol contract.
    ProtocolViolation(&'static str),
}

impl CommError {
    fn unexpected(expected: &'static str, got: &Message) -> Self {
        Self::UnexpectedMessage {
            expected,
            got: got.variant_name(),
        }
    }
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerGone { peer } => write!(f, "peer rank {peer} is gone"),
            Self::NoRoute { rank } => write!(f, "no route to rank {rank}"),
            Self::UnexpectedMessage { expected, got } => {
                write!(f, "expected {expected} payload, got {got}")
            }
            Self::ProtocolViolation(what) => write!(f, "protocol violation: {what}"),
        }
    }
}

impl Error for CommError {}

/// Outstanding halo receives, returned by [`Transport::begin_halo_exchange`].
///
/// The stencil engine must not read halo edge rows until this handle has
/// been consumed by [`Transport::finish_halo_exchange`].
#[derive(Debug, Default)]
#[must_use = "halo edges are stale until the exchange is finished"]
pub struct PendingHalo {
    from_up: Option<usize>,
    from_down: Option<usize>,
}

/// A full grid reassembled on the gather root, encoded as snapshot codes
/// (0 = fuel, 1 = burning, 2 = burnt) in row-major rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledGrid {
    /// Total rows across all partitions.
    pub rows: usize,
    /// Columns.
    pub cols: usize,
    /// Row-major cell codes.
    pub codes: Vec<u8>,
}

/// Reliable, ordered message passing between a fixed chain of workers.
///
/// Point-to-point calls block until the matching call on the peer; a
/// mismatched tag between a rank pair blocks both sides forever. That is
/// deliberate (crash-stop model), not a recoverable condition.
pub trait Transport {
    /// This worker's rank in `0..size`.
    fn rank(&self) -> usize;

    /// Number of cooperating workers.
    fn size(&self) -> usize;

    /// Blocking send of `message` to `dest` under `tag`.
    ///
    /// Channel-backed implementations buffer, so the send itself returns
    /// once the message is in flight; delivery still requires the peer to
    /// post the matching receive.
    ///
    /// # Errors
    ///
    /// Fails if `dest` is unreachable or its endpoint is gone.
    fn send(&self, dest: usize, tag: Tag, message: Message) -> Result<(), CommError>;

    /// Blocking receive of the next message from `src` under `tag`.
    ///
    /// # Errors
    ///
    /// Fails if `src` is unreachable or its endpoint is gone.
    fn recv(&self, src: usize, tag: Tag) -> Result<Message, CommError>;

    /// Block until every worker has called `barrier`.
    fn barrier(&self);

    /// Up-neighbor in the chain, absent for rank 0.
    fn up(&self) -> Option<usize> {
        self.rank().checked_sub(1)
    }

    /// Down-neighbor in the chain, absent for the last rank.
    fn down(&self) -> Option<usize> {
        let down = self.rank() + 1;
        (down < self.size()).then_some(down)
    }

    /// Issue the boundary-row sends for this step and record which ghost
    /// rows are owed to us. Sends to both neighbors are issued before any
    /// receive, so the two directions overlap in flight.
    ///
    /// # Errors
    ///
    /// Fails if a neighbor endpoint is gone.
    fn begin_halo_exchange(&self, partition: &Partition) -> Result<PendingHalo, CommError> {
        let mut pending = PendingHalo::default();
        if let Some(up) = self.up() {
            self.send(up, Tag::HaloUp, Message::Row(partition.top_row()))?;
            pending.from_up = Some(up);
        }
        if let Some(down) = self.down() {
            self.send(down, Tag::HaloDown, Message::Row(partition.bottom_row()))?;
            pending.from_down = Some(down);
        }
        Ok(pending)
    }

    /// Block until every outstanding ghost row has arrived, then write the
    /// halo edges. Only after this returns may the stencil read the halo.
    ///
    /// # Errors
    ///
    /// Fails if a neighbor endpoint is gone or sent a mistyped payload.
    fn finish_halo_exchange(
        &self,
        pending: PendingHalo,
        partition: &mut Partition,
    ) -> Result<(), CommError> {
        if let Some(up) = pending.from_up {
            let row = self.recv(up, Tag::HaloDown)?.into_row()?;
            partition.set_halo_edge(HaloEdge::Top, &row);
        }
        if let Some(down) = pending.from_down {
            let row = self.recv(down, Tag::HaloUp)?.into_row()?;
            partition.set_halo_edge(HaloEdge::Bottom, &row);
        }
        Ok(())
    }

    /// Sum `local` across all workers; the total lands on `root` only.
    ///
    /// # Errors
    ///
    /// Fails if any contributing endpoint is gone.
    fn reduce_sum(&self, local: u64, root: usize) -> Result<Option<u64>, CommError> {
        if self.rank() == root {
            let mut total = local;
            for peer in (0..self.size()).filter(|&peer| peer != root) {
                total += self.recv(peer, Tag::Reduce)?.into_value()?;
            }
            Ok(Some(total))
        } else {
            self.send(root, Tag::Reduce, Message::Value(local))?;
            Ok(None)
        }
    }

    /// Variable-length gather: reassemble every partition, in rank order,
    /// into one contiguous grid on `root`.
    ///
    /// Two steps, because partitions resize at runtime: every rank first
    /// announces its current row count, the root prefix-sums those into
    /// per-rank offsets, then the blocks land contiguously. Non-root ranks
    /// contribute data and receive nothing (returns `None` there).
    ///
    /// # Errors
    ///
    /// Fails if any contributing endpoint is gone or sends a mistyped
    /// payload.
    fn gather_rows(
        &self,
        partition: &Partition,
        root: usize,
    ) -> Result<Option<AssembledGrid>, CommError> {
        if self.rank() != root {
            self.send(root, Tag::GatherCount, Message::Count(partition.rows()))?;
            self.send(root, Tag::GatherData, Message::Block(partition.interior_codes()))?;
            return Ok(None);
        }

        let mut counts = vec![0usize; self.size()];
        counts[root] = partition.rows();
        for peer in (0..self.size()).filter(|&peer| peer != root) {
            counts[peer] = self.recv(peer, Tag::GatherCount)?.into_count()?;
        }

        let cols = partition.cols();
        let total_rows: usize = counts.iter().sum();
        let mut codes = vec![0u8; total_rows * cols];
        let mut offset = 0;
        for peer in 0..self.size() {
            let block = if peer == root {
                partition.interior_codes()
            } else {
                self.recv(peer, Tag::GatherData)?.into_block()?
            };
            if block.len() != counts[peer] * cols {
                return Err(CommError::ProtocolViolation(
                    "gather block does not match announced row count",
                ));
            }
            codes[offset..offset + block.len()].copy_from_slice(&block);
            offset += block.len();
        }

        Ok(Some(AssembledGrid {
            rows: total_rows,
            cols,
            codes,
        }))
    }
}

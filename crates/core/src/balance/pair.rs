//! Pairwise balancing rendezvous between two row-adjacent workers
//!
//! One side initiates, the other responds; the roles are assigned by rank
//! parity one level up, so for any boundary exactly one side is the
//! initiator at any instant. The exchange is a fixed blocking sequence
//! (loads both ways, one command, optionally one row payload) and both
//! sides walk the same explicit state machine, which keeps the protocol
//! auditable and testable against a scripted transport.
//!
//! The initiator is always the up-side of the boundary: it sheds or grows
//! at its bottom edge, the responder at its top edge, so the shared
//! boundary stays physically contiguous.

use crate::grid::Partition;
use crate::transport::{BalanceCommand, CommError, Message, Tag, Transport};
use tracing::debug;

/// Which side of the rendezvous this worker plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRole {
    /// Measures both loads and decides; pairs with its down-neighbor.
    Initiator,
    /// Reports its load and obeys the command; pairs with its up-neighbor.
    Responder,
}

/// States of one balancing rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// Nothing exchanged yet.
    Idle,
    /// Own load report is on the wire.
    SentLoad,
    /// Initiator waiting for the responder's load report.
    AwaitingLoadReply,
    /// Responder waiting for the initiator's command.
    AwaitingCommand,
    /// Waiting for a migrated row payload.
    AwaitingRowPayload,
    /// Rendezvous complete.
    Done,
}

/// What one rendezvous did to the local partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairOutcome {
    /// This worker migrated its boundary row to the neighbor.
    pub gave_row: bool,
    /// This worker appended a row migrated from the neighbor.
    pub took_row: bool,
}

/// Run one rendezvous with `neighbor` in the given role.
///
/// Load reports carry the sender's row count alongside its burning-cell
/// count, so the initiator never commands a minimum-size responder to give
/// up a row; row conservation holds unconditionally. A command is sent even
/// on a no-op to keep the blocking sequence in lock-step.
///
/// # Errors
///
/// Fails if the neighbor's endpoint is gone, a payload is mistyped, or the
/// peer commands something its own load report made impossible.
pub fn run_pair<T: Transport + ?Sized>(
    transport: &T,
    partition: &mut Partition,
    neighbor: usize,
    role: PairRole,
    threshold: u64,
    min_rows: usize,
) -> Result<PairOutcome, CommError> {
    let my_load = partition.burning_count();
    let mut outcome = PairOutcome::default();
    let mut state = PairState::Idle;

    while state != PairState::Done {
        state = match (role, state) {
            (PairRole::Initiator, PairState::Idle) => {
                transport.send(
                    neighbor,
                    Tag::Load,
                    Message::Load {
                        burning: my_load,
                        rows: partition.rows(),
                    },
                )?;
                PairState::SentLoad
            }
            (PairRole::Initiator, PairState::SentLoad) => PairState::AwaitingLoadReply,
            (PairRole::Initiator, PairState::AwaitingLoadReply) => {
                let (their_load, their_rows) = transport.recv(neighbor, Tag::Load)?.into_load()?;
                if my_load > their_load + threshold && partition.rows() > min_rows {
                    debug!(
                        rank = transport.rank(),
                        neighbor, my_load, their_load, "shedding boundary row"
                    );
                    transport.send(neighbor, Tag::Command, Message::Command(BalanceCommand::TakeRow))?;
                    let row = partition.take_bottom_row();
                    transport.send(neighbor, Tag::RowPayload, Message::Row(row))?;
                    outcome.gave_row = true;
                    PairState::Done
                } else if their_load > my_load + threshold && their_rows > min_rows {
                    debug!(
                        rank = transport.rank(),
                        neighbor, my_load, their_load, "requesting boundary row"
                    );
                    transport.send(neighbor, Tag::Command, Message::Command(BalanceCommand::GiveRow))?;
                    PairState::AwaitingRowPayload
                } else {
                    transport.send(neighbor, Tag::Command, Message::Command(BalanceCommand::NoChange))?;
                    PairState::Done
                }
            }
            (PairRole::Initiator, PairState::AwaitingRowPayload) => {
                let row = transport.recv(neighbor, Tag::RowPayload)?.into_row()?;
                partition.push_bottom_row(row);
                outcome.took_row = true;
                PairState::Done
            }
            (PairRole::Responder, PairState::Idle) => {
                // Initiator's report arrives first; its content does not
                // matter to the responder, which only obeys the command.
                transport.recv(neighbor, Tag::Load)?.into_load()?;
                transport.send(
                    neighbor,
                    Tag::Load,
                    Message::Load {
                        burning: my_load,
                        rows: partition.rows(),
                    },
                )?;
                PairState::SentLoad
            }
            (PairRole::Responder, PairState::SentLoad) => PairState::AwaitingCommand,
            (PairRole::Responder, PairState::AwaitingCommand) => {
                match transport.recv(neighbor, Tag::Command)?.into_command()? {
                    BalanceCommand::TakeRow => PairState::AwaitingRowPayload,
                    BalanceCommand::GiveRow => {
                        if partition.rows() <= min_rows {
                            // Unreachable when the initiator honors our row
                            // count; a peer that asks anyway is broken.
                            return Err(CommError::ProtocolViolation(
                                "asked to give up a row at minimum partition size",
                            ));
                        }
                        let row = partition.take_top_row();
                        transport.send(neighbor, Tag::RowPayload, Message::Row(row))?;
                        outcome.gave_row = true;
                        PairState::Done
                    }
                    BalanceCommand::NoChange => PairState::Done,
                }
            }
            (PairRole::Responder, PairState::AwaitingRowPayload) => {
                let row = transport.recv(neighbor, Tag::RowPayload)?.into_row()?;
                partition.push_top_row(row);
                outcome.took_row = true;
                PairState::Done
            }
            (PairRole::Initiator, PairState::AwaitingCommand)
            | (PairRole::Responder, PairState::AwaitingLoadReply)
            | (_, PairState::Done) => unreachable!("invalid rendezvous state"),
        };
    }

    Ok(outcome)
}

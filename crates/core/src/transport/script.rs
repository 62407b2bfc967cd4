//! Scripted transport for protocol unit tests
//!
//! Replays a fixed transcript of expected operations: every `send` must
//! match the next scripted send exactly, every `recv` consumes the next
//! scripted reply. Any deviation panics with the position in the script,
//! which makes pairwise-protocol tests read as plain transcripts.

use super::{CommError, Message, Tag, Transport};
use std::cell::RefCell;
use std::collections::VecDeque;

/// One expected transport operation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expect {
    /// The code under test must send exactly this message.
    Send {
        dest: usize,
        tag: Tag,
        message: Message,
    },
    /// The code under test must receive here; `reply` is handed back.
    Recv { src: usize, tag: Tag, reply: Message },
    /// The code under test must hit a barrier.
    Barrier,
}

/// Transport that asserts a fixed operation transcript.
pub(crate) struct ScriptedTransport {
    rank: usize,
    size: usize,
    script: RefCell<VecDeque<Expect>>,
    consumed: RefCell<usize>,
}

impl ScriptedTransport {
    pub(crate) fn new(rank: usize, size: usize, script: Vec<Expect>) -> Self {
        Self {
            rank,
            size,
            script: RefCell::new(script.into()),
            consumed: RefCell::new(0),
        }
    }

    fn next(&self, doing: &str) -> Expect {
        let position = *self.consumed.borrow();
        let expect = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("script exhausted at op {position}, but code did {doing}"));
        *self.consumed.borrow_mut() += 1;
        expect
    }

    /// Assert the whole script was consumed.
    pub(crate) fn finish(self) {
        let remaining = self.script.borrow().len();
        assert_eq!(remaining, 0, "{remaining} scripted ops never happened");
    }
}

impl Transport for ScriptedTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, message: Message) -> Result<(), CommError> {
        let expect = self.next("send");
        match expect {
            Expect::Send {
                dest: expected_dest,
                tag: expected_tag,
                message: expected_message,
            } => {
                assert_eq!((dest, tag), (expected_dest, expected_tag), "send routing");
                assert_eq!(message, expected_message, "send payload");
                Ok(())
            }
            other => panic!("expected {other:?}, but code sent {message:?} to {dest}"),
        }
    }

    fn recv(&self, src: usize, tag: Tag) -> Result<Message, CommError> {
        let expect = self.next("recv");
        match expect {
            Expect::Recv {
                src: expected_src,
                tag: expected_tag,
                reply,
            } => {
                assert_eq!((src, tag), (expected_src, expected_tag), "recv routing");
                Ok(reply)
            }
            other => panic!("expected {other:?}, but code received from {src} under {tag:?}"),
        }
    }

    fn barrier(&self) {
        let expect = self.next("barrier");
        assert_eq!(expect, Expect::Barrier, "expected a barrier here");
    }
}

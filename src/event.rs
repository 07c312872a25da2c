//! The closed set of events and RPC messages the environment dispatches.
//!
//! Replaces the original implementation's stringly-typed `rpc_<name>`
//! handler lookup with tagged variants matched exhaustively at the call
//! site, so an unhandled RPC or event kind is a compile error rather than
//! a silent no-op.

use std::cmp::Ordering;

use crate::identifier::Identifier;
use crate::time::VirtualTime;

/// An RPC message exchanged between nodes. Carried inside
/// [`EventKind::SendMessage`]/[`EventKind::ReceiveMessage`].
#[derive(Debug, Clone)]
pub enum Rpc {
    FindSuccessor {
        key: Identifier,
        req_id: u64,
    },
    FindSuccessorResponse {
        successor_id: Identifier,
        req_id: u64,
    },
    Notify,
    GetPredecessor,
    GetPredecessorResponse {
        predecessor: Option<Identifier>,
    },
    GetSuccessorList,
    GetSuccessorListResponse {
        successor_list: Vec<Identifier>,
    },
}

/// A scheduled occurrence in the simulation.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// Spawn a new node, bootstrapping through `node_id` if given, or the
    /// lowest active node id if the ring is non-empty and unspecified.
    NodeJoin { node_id: Option<Identifier> },
    /// Mark a node inactive. If `node_id` is unspecified, a random active
    /// node is chosen; the last surviving node is never failed.
    NodeFail { node_id: Option<Identifier> },
    /// A message in flight; the dispatcher turns this into a
    /// [`EventKind::ReceiveMessage`] delayed by the configured base latency.
    SendMessage {
        src: Identifier,
        dst: Identifier,
        rpc: Rpc,
    },
    /// A message delivered to `dst`. Silently dropped if `dst` is inactive.
    ReceiveMessage {
        src: Identifier,
        dst: Identifier,
        rpc: Rpc,
    },
    /// A previously scheduled timer has elapsed.
    TimeoutExpired { node_id: Identifier, timer_id: u64 },
    /// Periodic stabilization tick for one node.
    StabilizeTick { node_id: Identifier },
    /// Instructs `start_id` to perform an iterative lookup of `key_id`.
    Lookup {
        start_id: Identifier,
        key_id: Identifier,
    },
}

/// A queued event with its delivery time and insertion sequence, used to
/// break same-time ties in FIFO order.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub time: VirtualTime,
    pub seq: u64,
    pub kind: EventKind,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    /// Reversed so a `BinaryHeap` (a max-heap) pops the earliest time, and
    /// among equal times, the earliest-inserted event (FIFO per tick).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

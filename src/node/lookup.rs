//! Synchronous iterative lookup (§4.7), used by experiment drivers that
//! need a lookup's outcome and hop count without waiting on simulated
//! message latency. Distinct from the message-driven recursive lookup in
//! [`super::rpc`], which is what nodes use against each other during
//! normal operation.
//!
//! Grounded directly in `Node.lookup_iterative` from the original
//! implementation: same hop budget, same visited-set loop guard, same
//! successor-list bridging check before counting a lookup as failed.

use std::collections::HashSet;

use crate::environment::Environment;
use crate::identifier::{ceil_log2, in_interval, owner_in_ring, Identifier};

use super::closest_preceding_finger_local;

/// `2 * ceil(log2(total_nodes + 1))`, floored at 2. `total_nodes` is the
/// full registry size (joined-ever, including inactive entries), matching
/// the original's `len(self.env.nodes)`.
fn hop_budget(total_nodes: usize) -> usize {
    (2 * ceil_log2(total_nodes + 1)).max(2) as usize
}

/// Outcome of a single iterative lookup, used by experiment drivers to
/// compute path-length and success-rate statistics.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub key: Identifier,
    pub hops: usize,
    pub resolved: Option<Identifier>,
}

/// Walks the finger tables hop by hop, synchronously, starting at
/// `start_id`, to resolve `key_id`. Each hop picks the same routing
/// decision a message-driven `FindSuccessor` RPC would (§4.6), but without
/// incurring simulated latency or needing a response message.
///
/// When `count_stats` is set, increments `lookups` on the origin node and,
/// if the resolved successor disagrees with the ring-truth oracle and the
/// gap cannot be bridged by walking the resolved successor's own
/// successor-list entries, increments `lookup_fail` too. A lookup that
/// revisits a node it has already seen, or exceeds the hop budget, is
/// counted as a failure and returns `None`.
pub fn lookup_iterative(
    env: &mut Environment,
    start_id: &Identifier,
    key_id: &Identifier,
    count_stats: bool,
) -> LookupOutcome {
    let bits = env.config().bits;
    // The original never removes a failed node from its registry, only
    // flips `active`, so the budget is computed over the full registry
    // size rather than the live-node count.
    let budget = hop_budget(env.nodes().len());

    if count_stats {
        if let Some(start_node) = env.nodes_mut().get_mut(start_id) {
            start_node.lookups += 1;
        }
    }

    let mut current = start_id.clone();
    let mut visited = HashSet::new();
    let mut hops = 0usize;

    for _ in 0..budget {
        let Some(node) = env.nodes().get(&current) else {
            return fail(env, start_id, key_id, count_stats, hops);
        };
        if !node.active || !visited.insert(current.clone()) {
            return fail(env, start_id, key_id, count_stats, hops);
        }

        if key_id == &node.node_id {
            return LookupOutcome { key: key_id.clone(), hops, resolved: Some(node.node_id.clone()) };
        }

        let successor = node.successor.clone();
        if in_interval(key_id, &node.node_id, &successor, false, true, bits) {
            if count_stats {
                check_successor_stat(env, start_id, key_id, &successor);
            }
            return LookupOutcome { key: key_id.clone(), hops, resolved: Some(successor) };
        }

        current = closest_preceding_finger_local(node, key_id, bits);
        hops += 1;
    }

    fail(env, start_id, key_id, count_stats, hops)
}

fn fail(env: &mut Environment, start_id: &Identifier, key_id: &Identifier, count_stats: bool, hops: usize) -> LookupOutcome {
    if count_stats {
        if let Some(start_node) = env.nodes_mut().get_mut(start_id) {
            start_node.lookup_fail += 1;
        }
    }
    LookupOutcome { key: key_id.clone(), hops, resolved: None }
}

/// Compares `successor` against the ring-truth oracle; if they disagree,
/// walks `successor`'s own successor-list entries looking for the oracle
/// before charging the lookup as a failure. This bridges the gap a
/// stale-but-not-yet-repaired finger can leave during convergence.
fn check_successor_stat(env: &mut Environment, start_id: &Identifier, key_id: &Identifier, successor: &Identifier) {
    let actual = owner_in_ring(env.latest_ring(), key_id);
    if successor == &actual {
        return;
    }

    let r = env.config().successor_list_size;
    let mut cur = successor.clone();
    let mut bridged = false;
    for _ in 0..r.saturating_sub(1) {
        let Some(node) = env.nodes().get(&cur) else { break };
        if !node.active {
            break;
        }
        cur = node.successor.clone();
        if cur == actual {
            bridged = true;
            break;
        }
    }

    if !bridged {
        if let Some(start_node) = env.nodes_mut().get_mut(start_id) {
            start_node.lookup_fail += 1;
        }
    }
}

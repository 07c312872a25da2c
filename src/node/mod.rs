//! Chord node: ring pointers, finger table, successor list, stabilization,
//! and the lookup engines built on top of them.
//!
//! A `Node` never holds a direct reference to another node — only
//! identifier-valued back-references, resolved through
//! [`crate::Environment::nodes`]. The environment exclusively owns all
//! nodes; see [`crate::environment::Environment`].

pub mod lookup;
pub mod rpc;

use std::collections::HashMap;

use tracing::trace;

use crate::environment::Environment;
use crate::identifier::{self, in_interval, Identifier};

/// A Chord node. Constructed and owned exclusively by the [`Environment`];
/// obtain one via [`join`].
#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: Identifier,
    pub physical_id: Identifier,
    pub active: bool,

    pub successor: Identifier,
    pub predecessor: Option<Identifier>,
    pub successor_list: Vec<Identifier>,

    pub finger: Vec<Identifier>,
    pub next_finger: usize,

    /// Outstanding message-driven lookups this node originated: req_id -> key.
    pub(crate) pending: HashMap<u64, Identifier>,
    /// Requests this node is relaying on behalf of another node: req_id ->
    /// the node that asked us, so the eventual response is forwarded back
    /// to the true asker rather than bounced to whoever sent it to us.
    pub(crate) relay: HashMap<u64, Identifier>,

    pub lookups: u64,
    pub lookup_fail: u64,
    pub(crate) count_stats: bool,

    outstanding_stabilize_timer: Option<u64>,
}

/// Constructs a new node, registers it with `env`, and executes the join
/// protocol (§4.4): bootstrap through `bootstrap_id`, or found a fresh
/// ring if `None`. Schedules the node's first stabilization tick when the
/// environment is in [`crate::MaintenanceMode::PerNode`]. Returns the new
/// node's id.
pub fn join(
    env: &mut Environment,
    bootstrap_id: Option<Identifier>,
    physical_id: Option<Identifier>,
    count_stats: bool,
) -> Identifier {
    let bits = env.config().bits;
    let node_id = identifier::random_identifier(env.rng(), bits);
    let physical_id = physical_id.unwrap_or_else(|| node_id.clone());

    let (successor, successor_list, finger) = match &bootstrap_id {
        None => {
            let r = env.config().successor_list_size;
            (
                node_id.clone(),
                vec![node_id.clone(); r],
                vec![node_id.clone(); bits as usize],
            )
        }
        Some(bootstrap) => {
            let successor = find_successor_local(env, bootstrap, &node_id);
            let mut finger = vec![node_id.clone(); bits as usize];
            finger[0] = successor.clone();
            (successor.clone(), vec![successor], finger)
        }
    };

    let node = Node {
        node_id: node_id.clone(),
        physical_id,
        active: true,
        successor,
        predecessor: None,
        successor_list,
        finger,
        next_finger: 0,
        pending: HashMap::new(),
        relay: HashMap::new(),
        lookups: 0,
        lookup_fail: 0,
        count_stats,
        outstanding_stabilize_timer: None,
    };
    let successor_for_notify = node.successor.clone();
    env.insert_node(node);

    if bootstrap_id.is_some() {
        env.send_message(node_id.clone(), successor_for_notify, crate::event::Rpc::Notify);
    }
    if env.maintenance_mode() == crate::environment::MaintenanceMode::PerNode {
        env.schedule_stabilize_tick(node_id.clone());
    }

    node_id
}

/// Pure in-memory walk returning the node owning `key`, starting from
/// `start`. Used only by bootstrap, warm-up, and synchronous maintenance —
/// never by message-driven lookups, which route hop-by-hop over RPCs.
/// Terminates because `closest_preceding_finger_local` always strictly
/// advances along the ring.
pub fn find_successor_local(env: &Environment, start: &Identifier, key: &Identifier) -> Identifier {
    let bits = env.config().bits;
    let node = env
        .nodes()
        .get(start)
        .expect("find_successor_local requires a registered node");

    if key == &node.node_id {
        return node.node_id.clone();
    }
    if in_interval(key, &node.node_id, &node.successor, false, true, bits) {
        return node.successor.clone();
    }
    let next = closest_preceding_finger_local(node, key, bits);
    if next == *start {
        // Finger table offers no progress (e.g. a lone or not-yet-converged
        // node); stop here rather than recursing forever.
        return node.successor.clone();
    }
    find_successor_local(env, &next, key)
}

/// Scans the finger table from the farthest entry down, returning the
/// first entry that strictly precedes `key` on the arc from `node`, else
/// `node` itself.
pub fn closest_preceding_finger_local(node: &Node, key: &Identifier, bits: u32) -> Identifier {
    for f in node.finger.iter().rev() {
        if in_interval(f, &node.node_id, key, false, false, bits) {
            return f.clone();
        }
    }
    node.node_id.clone()
}

impl Node {
    pub(crate) fn cancel_outstanding_stabilize_timer(&mut self, env: &mut Environment) {
        if let Some(timer_id) = self.outstanding_stabilize_timer.take() {
            env.cancel_timer(self.node_id.clone(), timer_id);
        }
    }

    /// §4.5 step 1: ask `successor` for its predecessor and successor
    /// list, and arm a presumed-failure timer in case neither response
    /// arrives.
    pub fn stabilize(&mut self, env: &mut Environment) {
        env.send_message(
            self.node_id.clone(),
            self.successor.clone(),
            crate::event::Rpc::GetPredecessor,
        );
        env.send_message(
            self.node_id.clone(),
            self.successor.clone(),
            crate::event::Rpc::GetSuccessorList,
        );
        if self.successor != self.node_id {
            let timeout = env.timeout_duration();
            let timer_id = env.schedule_timer(self.node_id.clone(), timeout);
            self.outstanding_stabilize_timer = Some(timer_id);
        }
    }

    /// §4.5 step 5: clear `predecessor` if it refers to an inactive node.
    pub fn check_predecessor(&mut self, env: &Environment) {
        if let Some(pred) = &self.predecessor {
            let alive = env.nodes().get(pred).map(|n| n.active).unwrap_or(false);
            if !alive {
                self.predecessor = None;
            }
        }
    }

    /// §4.5 step 6: rotating incremental finger repair. Each tick refreshes
    /// exactly one entry, advancing `next_finger`.
    pub fn fix_fingers(&mut self, env: &Environment) {
        let bits = env.config().bits;
        self.next_finger = (self.next_finger + 1) % bits as usize;
        let target = identifier::finger_start(&self.node_id, self.next_finger as u32, bits);
        // `self` has already been removed from the registry by the
        // dispatcher for the duration of this call, so the walk must start
        // from our own successor rather than re-resolving our own id.
        let owner = if target == self.node_id {
            self.node_id.clone()
        } else {
            find_successor_local_from(env, self, &target, bits)
        };
        self.finger[self.next_finger] = owner;
    }

    /// §4.5: run stabilize, fix_fingers, and check_predecessor in sequence.
    /// The per-node recurring tick re-arms itself (see
    /// `Environment::dispatch_stabilize_tick`) whenever maintenance mode is
    /// `PerNode`.
    pub fn handle_stabilize_tick(&mut self, env: &mut Environment) {
        self.stabilize(env);
        self.fix_fingers(env);
        self.check_predecessor(env);
    }

    /// §5 Timeouts: if a stabilize RPC went unanswered, the peer is
    /// presumed down; promote the next successor_list entry so routing
    /// keeps making progress.
    pub fn handle_timeout(&mut self, _env: &mut Environment, _timer_id: u64) {
        if let Some(next) = self.successor_list.first().cloned() {
            if next != self.successor {
                trace!(node_id = %self.node_id, old = %self.successor, new = %next, "presumed successor failure");
                self.successor = next;
            }
        }
        self.outstanding_stabilize_timer = None;
    }

    pub fn fail(&mut self) {
        self.active = false;
    }
}

/// Local routing variant used from within a method that has already
/// removed `self` from the registry (the dispatcher's remove/mutate/
/// reinsert pattern for `StabilizeTick`). Walks starting from `node`'s own
/// successor instead of re-resolving `node.node_id` through the registry.
fn find_successor_local_from(env: &Environment, node: &Node, key: &Identifier, bits: u32) -> Identifier {
    if key == &node.node_id {
        return node.node_id.clone();
    }
    if in_interval(key, &node.node_id, &node.successor, false, true, bits) {
        return node.successor.clone();
    }
    let next = closest_preceding_finger_local(node, key, bits);
    if next == node.node_id {
        return node.successor.clone();
    }
    find_successor_local(env, &next, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn first_node_forms_a_singleton_ring() {
        let mut env = Environment::with_config(crate::config::Config { bits: 8, ..Default::default() }, 1);
        let id = join(&mut env, None, None, false);
        let node = env.nodes().get(&id).unwrap();
        assert_eq!(node.successor, id);
        assert!(node.finger.iter().all(|f| *f == id));
        assert_eq!(node.predecessor, None);
    }

    #[test]
    fn join_adopts_bootstrap_successor_and_stale_fingers() {
        let mut env = Environment::with_config(crate::config::Config { bits: 8, ..Default::default() }, 2);
        let first = join(&mut env, None, None, false);
        let second = join(&mut env, Some(first.clone()), None, false);
        let node = env.nodes().get(&second).unwrap();
        // finger[0] is trusted immediately; the rest start as the
        // "unknown" sentinel (self) until stabilization converges them.
        assert_eq!(node.finger[0], node.successor);
        assert!(node.finger[1..].iter().all(|f| *f == second));
    }
}

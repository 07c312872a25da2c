//! Synchronous maintenance routines used by [`crate::MaintenanceMode::Batched`]
//! and by the warm-up procedure that precedes it.
//!
//! Grounded in `experiments/exp_4_churn.py`'s `warm_up`/`global_stabilizer`
//! and `sim/node.py`'s `stabilize_sync`/`check_predecessor_sync`/
//! `fix_specific_finger_sync`. The original monkey-patches
//! `Node._schedule_stabilize` to a no-op and drives maintenance from an
//! external batch loop instead; here that's an explicit mode
//! ([`crate::MaintenanceMode::Batched`]) rather than a patched method, and
//! `warm_up`/`run_global_stabilizer_tick` are free functions over
//! `&mut Environment` rather than generator coroutines.

use std::collections::HashSet;

use tracing::debug;

use crate::environment::Environment;
use crate::identifier::{ceil_log2, finger_start, in_interval, Identifier};

/// Directly assigns every active node's successor, predecessor,
/// successor-list, and full finger table from the sorted ring, bypassing
/// stabilization entirely. Used once at the start of a batched-maintenance
/// run so experiments measure steady-state behavior rather than the
/// convergence transient.
pub fn warm_up(env: &mut Environment) {
    env.refresh_latest_ring();
    let ring = env.latest_ring().to_vec();
    let n = ring.len();
    if n == 0 {
        return;
    }
    let bits = env.config().bits;
    let r = env.config().successor_list_size;

    for (idx, nid) in ring.iter().enumerate() {
        let successor = ring[(idx + 1) % n].clone();
        let predecessor = ring[(idx + n - 1) % n].clone();
        let successor_list: Vec<Identifier> = (1..=r).map(|j| ring[(idx + j) % n].clone()).collect();
        let finger: Vec<Identifier> = (0..bits)
            .map(|b| {
                let target = finger_start(nid, b, bits);
                owner_by_sorted_search(&ring, &target)
            })
            .collect();

        if let Some(node) = env.nodes_mut().get_mut(nid) {
            node.successor = successor;
            node.predecessor = Some(predecessor);
            node.successor_list = successor_list;
            node.finger = finger;
        }
    }
    debug!(n_nodes = n, "warm-up complete: all pointers set from ring truth");
}

fn owner_by_sorted_search(ring: &[Identifier], target: &Identifier) -> Identifier {
    let idx = ring.partition_point(|id| id < target);
    if idx == ring.len() {
        ring[0].clone()
    } else {
        ring[idx].clone()
    }
}

/// One sweep of the batched global stabilizer (§4.8/§4.10): refreshes the
/// active-node snapshot, then runs `stabilize_sync` + a bounded number of
/// `fix_specific_finger_sync` calls + `check_predecessor_sync` for every
/// active node, mirroring one iteration of the original's
/// `global_stabilizer` generator loop.
pub fn global_stabilizer_tick(env: &mut Environment) {
    env.refresh_latest_ring();
    let ring = env.latest_ring().to_vec();
    if ring.is_empty() {
        return;
    }
    let bits = env.config().bits;
    let max_fingers_to_fix = ceil_log2(ring.len()).max(1) as usize;

    for (idx, nid) in ring.iter().enumerate() {
        let Some(mut node) = env.nodes_mut().remove(nid) else { continue };
        if !node.active {
            env.nodes_mut().insert(nid.clone(), node);
            continue;
        }

        if !env.nodes().get(&node.successor).map(|n| n.active).unwrap_or(false) {
            node.successor = ring[(idx + 1) % ring.len()].clone();
        }

        stabilize_sync(&mut node, env, bits);
        for idx_to_fix in 0..max_fingers_to_fix.min(bits as usize) {
            fix_specific_finger_sync(&mut node, env, idx_to_fix as u32, bits);
        }
        check_predecessor_sync(&mut node, env);

        env.nodes_mut().insert(nid.clone(), node);
    }
}

/// §4.8 synchronous stabilize: ensure a live successor (promoting from the
/// successor list, or falling back to an arbitrary live peer, as the
/// original does), adopt the successor's predecessor if it tightens the
/// ring, refresh the successor list, and notify.
fn stabilize_sync(node: &mut crate::node::Node, env: &mut Environment, bits: u32) {
    let mut visited_while_searching_live_successor = HashSet::new();
    loop {
        let alive = env.nodes().get(&node.successor).map(|n| n.active).unwrap_or(false);
        if alive {
            break;
        }
        if let Some(next) = node.successor_list.first().cloned() {
            node.successor_list.remove(0);
            node.successor = next;
        } else {
            // Sourced from `latest_ring` (sorted, deterministic) rather than
            // iterating `env.nodes()` directly: a `HashMap`'s iteration
            // order is randomized per-process and would make the fallback
            // successor depend on memory layout instead of the seed.
            let live: Vec<Identifier> = env
                .latest_ring()
                .iter()
                .filter(|id| **id != node.node_id)
                .cloned()
                .collect();
            if live.is_empty() {
                node.successor = node.node_id.clone();
                return;
            }
            node.successor = env.rng().choose(&live).cloned().unwrap_or_else(|| node.node_id.clone());
        }
        if !visited_while_searching_live_successor.insert(node.successor.clone()) {
            // No live candidate reachable; stop rather than loop forever.
            node.successor = node.node_id.clone();
            return;
        }
    }

    if node.successor == node.node_id {
        return;
    }

    let r = env.config().successor_list_size;
    refresh_successor_list(node, env, r);

    let pred_of_successor = env.nodes().get(&node.successor).and_then(|n| n.predecessor.clone());
    if let Some(candidate) = pred_of_successor {
        let candidate_alive = env.nodes().get(&candidate).map(|n| n.active).unwrap_or(false);
        if candidate_alive && in_interval(&candidate, &node.node_id, &node.successor, false, false, bits) {
            node.successor = candidate;
            refresh_successor_list(node, env, r);
        }
    }

    notify_sync(env, &node.successor.clone(), &node.node_id.clone());
}

fn refresh_successor_list(node: &mut crate::node::Node, env: &Environment, r: usize) {
    let mut list = vec![node.successor.clone()];
    if let Some(successor_node) = env.nodes().get(&node.successor) {
        list.extend(successor_node.successor_list.iter().take(r.saturating_sub(1)).cloned());
    }
    node.successor_list = list;
}

/// Equivalent of `rpc_notify_sync`: directly mutates `target`'s
/// predecessor rather than sending a message, since the batched
/// maintenance loop has no simulated latency to model.
fn notify_sync(env: &mut Environment, target: &Identifier, candidate: &Identifier) {
    let bits = env.config().bits;
    if let Some(mut t) = env.nodes_mut().remove(target) {
        let should_adopt = match &t.predecessor {
            None => true,
            Some(pred) => in_interval(candidate, pred, &t.node_id, false, false, bits),
        };
        if should_adopt {
            t.predecessor = Some(candidate.clone());
        }
        env.nodes_mut().insert(target.clone(), t);
    }
}

fn check_predecessor_sync(node: &mut crate::node::Node, env: &Environment) {
    if let Some(pred) = &node.predecessor {
        let alive = env.nodes().get(pred).map(|n| n.active).unwrap_or(false);
        if !alive {
            node.predecessor = None;
        }
    }
}

fn fix_specific_finger_sync(node: &mut crate::node::Node, env: &Environment, idx: u32, bits: u32) {
    let target = finger_start(&node.node_id, idx, bits);
    let owner = crate::node::find_successor_local(env, &node.successor, &target);
    node.finger[idx as usize] = owner;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::environment::Environment;

    #[test]
    fn warm_up_sets_exact_ring_neighbors() {
        let mut env = Environment::with_config(Config { bits: 8, ..Default::default() }, 21);
        let mut prev = crate::node::join(&mut env, None, None, false);
        for _ in 0..4 {
            prev = crate::node::join(&mut env, Some(prev), None, false);
        }
        warm_up(&mut env);
        let ring = env.latest_ring().to_vec();
        for (idx, nid) in ring.iter().enumerate() {
            let node = env.nodes().get(nid).unwrap();
            assert_eq!(node.successor, ring[(idx + 1) % ring.len()]);
            assert_eq!(node.predecessor, Some(ring[(idx + ring.len() - 1) % ring.len()].clone()));
        }
    }

    #[test]
    fn global_stabilizer_tick_survives_a_failed_successor() {
        let mut env = Environment::with_config(Config { bits: 8, ..Default::default() }, 22);
        let mut prev = crate::node::join(&mut env, None, None, false);
        let mut ids = vec![prev.clone()];
        for _ in 0..4 {
            prev = crate::node::join(&mut env, Some(prev), None, false);
            ids.push(prev.clone());
        }
        warm_up(&mut env);
        env.nodes_mut().get_mut(&ids[1]).unwrap().active = false;
        env.refresh_latest_ring();
        global_stabilizer_tick(&mut env);
        let survivor = env.nodes().get(&ids[0]).unwrap();
        assert!(env.nodes().get(&survivor.successor).map(|n| n.active).unwrap_or(false));
    }
}

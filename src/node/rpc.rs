//! RPC handlers (§4.6). Each function receives the target node with
//! itself already removed from the environment's registry, mirroring how
//! the original dispatches `rpc_<name>` methods by message tag.

use tracing::{debug, warn};

use crate::environment::Environment;
use crate::event::Rpc;
use crate::identifier::{in_interval, Identifier};

use super::{closest_preceding_finger_local, Node};

/// Dispatches one delivered RPC to `node`, which has already been removed
/// from `env.nodes()` by the caller.
pub fn handle(node: &mut Node, env: &mut Environment, src: &Identifier, rpc: Rpc) {
    match rpc {
        Rpc::FindSuccessor { key, req_id } => handle_find_successor(node, env, src, key, req_id),
        Rpc::FindSuccessorResponse { successor_id, req_id } => {
            handle_find_successor_response(node, env, req_id, successor_id)
        }
        Rpc::Notify => handle_notify(node, env, src),
        Rpc::GetPredecessor => handle_get_predecessor(node, env, src),
        Rpc::GetPredecessorResponse { predecessor } => {
            handle_get_predecessor_response(node, env, predecessor)
        }
        Rpc::GetSuccessorList => handle_get_successor_list(node, env, src),
        Rpc::GetSuccessorListResponse { successor_list } => {
            handle_get_successor_list_response(node, env, successor_list)
        }
    }
}

/// Begins a message-driven lookup of `key` on behalf of `origin`,
/// recording it in `pending` so the eventual response can be matched back.
/// Grounded in the original's `begin_lookup`/`Node.find_successor` entry
/// point; see §4.6.
pub fn begin_lookup(node: &mut Node, env: &mut Environment, key: Identifier) -> u64 {
    let req_id = env.next_request_id();
    node.pending.insert(req_id, key.clone());
    route_find_successor(node, env, key, req_id);
    req_id
}

fn route_find_successor(node: &Node, env: &mut Environment, key: Identifier, req_id: u64) {
    let bits = env.config().bits;
    if key == node.node_id
        || in_interval(&key, &node.node_id, &node.successor, false, true, bits)
    {
        env.send_message(
            node.node_id.clone(),
            node.node_id.clone(),
            Rpc::FindSuccessorResponse {
                successor_id: node.successor.clone(),
                req_id,
            },
        );
        return;
    }
    let next = closest_preceding_finger_local(node, &key, bits);
    env.send_message(node.node_id.clone(), next, Rpc::FindSuccessor { key, req_id });
}

fn handle_find_successor(node: &mut Node, env: &mut Environment, src: &Identifier, key: Identifier, req_id: u64) {
    let bits = env.config().bits;
    if key == node.node_id || in_interval(&key, &node.node_id, &node.successor, false, true, bits) {
        env.send_message(
            node.node_id.clone(),
            src.clone(),
            Rpc::FindSuccessorResponse {
                successor_id: node.successor.clone(),
                req_id,
            },
        );
        return;
    }
    let next = closest_preceding_finger_local(node, &key, bits);
    if next == node.node_id {
        // No finger makes progress; answer with our own successor rather
        // than looping the request back to ourselves.
        env.send_message(
            node.node_id.clone(),
            src.clone(),
            Rpc::FindSuccessorResponse {
                successor_id: node.successor.clone(),
                req_id,
            },
        );
        return;
    }
    // Remember who asked, so the response — which `next` will eventually
    // address back to `node`, not to `src` — gets relayed to the true
    // origin instead of bounced to whichever node forwarded it here. This
    // closes the relay loop the original implementation left open.
    node.relay.insert(req_id, src.clone());
    env.send_message(node.node_id.clone(), next, Rpc::FindSuccessor { key, req_id });
}

fn handle_find_successor_response(node: &mut Node, env: &mut Environment, req_id: u64, successor_id: Identifier) {
    if let Some(key) = node.pending.remove(&req_id) {
        // Matches the original exactly: a message-driven lookup's
        // completion is graded against the ring-truth oracle here, but
        // unlike `lookup_iterative` it never increments `lookups` itself —
        // that counter is reserved for the synchronous API's call sites.
        let oracle = crate::identifier::owner_in_ring(env.latest_ring(), &key);
        if successor_id != oracle {
            node.lookup_fail += 1;
        }
        debug!(node_id = %node.node_id, %key, %successor_id, "message-driven lookup resolved");
        return;
    }
    if let Some(origin) = node.relay.remove(&req_id) {
        env.send_message(
            node.node_id.clone(),
            origin,
            Rpc::FindSuccessorResponse { successor_id, req_id },
        );
        return;
    }
    warn!(node_id = %node.node_id, req_id, "find_successor_response with no pending or relay entry; dropped");
}

/// §4.5 step 2 / §4.6: a predecessor candidate announces itself. Adopt it
/// only if our current predecessor is absent or the candidate lies
/// strictly between it and us.
fn handle_notify(node: &mut Node, env: &mut Environment, src: &Identifier) {
    let bits = env.config().bits;
    let should_adopt = match &node.predecessor {
        None => true,
        Some(pred) => in_interval(src, pred, &node.node_id, false, false, bits),
    };
    if should_adopt {
        node.predecessor = Some(src.clone());
    }
}

fn handle_get_predecessor(node: &Node, env: &mut Environment, src: &Identifier) {
    env.send_message(
        node.node_id.clone(),
        src.clone(),
        Rpc::GetPredecessorResponse {
            predecessor: node.predecessor.clone(),
        },
    );
}

/// §4.5 step 3-4: reconcile our successor against what it reports as its
/// own predecessor, then notify the (possibly updated) successor.
fn handle_get_predecessor_response(node: &mut Node, env: &mut Environment, predecessor: Option<Identifier>) {
    node.cancel_outstanding_stabilize_timer(env);
    let bits = env.config().bits;
    if let Some(candidate) = predecessor {
        if candidate != node.node_id
            && in_interval(&candidate, &node.node_id, &node.successor, false, false, bits)
        {
            node.successor = candidate;
        }
    }
    env.send_message(node.node_id.clone(), node.successor.clone(), Rpc::Notify);
    env.send_message(node.node_id.clone(), node.successor.clone(), Rpc::GetSuccessorList);
}

/// §4.5 step 3: reply with our own raw successor list, which by invariant
/// already starts with our own direct successor. The requester — not us —
/// does the prefixing with its own successor; see
/// `handle_get_successor_list_response`.
fn handle_get_successor_list(node: &Node, env: &mut Environment, src: &Identifier) {
    let mut list = node.successor_list.clone();
    list.truncate(env.config().successor_list_size);
    env.send_message(
        node.node_id.clone(),
        src.clone(),
        Rpc::GetSuccessorListResponse { successor_list: list },
    );
}

/// §4.5 step 3: rebuilds our successor_list as `[successor] ++
/// successor's_list[:r-1]`, mirroring `maintenance::refresh_successor_list`.
fn handle_get_successor_list_response(node: &mut Node, env: &Environment, successor_list: Vec<Identifier>) {
    let r = env.config().successor_list_size;
    let mut list = vec![node.successor.clone()];
    list.extend(successor_list.into_iter().take(r.saturating_sub(1)));
    node.successor_list = list;
}

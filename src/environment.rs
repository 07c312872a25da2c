//! The discrete-event substrate: a priority queue of timed events, a
//! seeded RNG, and the node registry. Single-threaded, cooperative,
//! run-to-completion dispatch — no handler ever suspends mid-execution.

use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::config::Config;
use crate::event::{EventKind, Rpc, ScheduledEvent};
use crate::identifier::Identifier;
use crate::node::{self, Node};
use crate::rng::DeterministicRng;
use crate::time::{Duration, VirtualTime};

/// Selects whether nodes drive their own periodic stabilization
/// (`PerNode`, the default asynchronous mode) or whether a
/// [`crate::maintenance::global_stabilizer_tick`] sweeps the whole ring on
/// a fixed cadence (`Batched`, used for large-N churn experiments).
/// Replaces monkey-patching a node method with an explicit mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceMode {
    PerNode,
    Batched,
}

pub struct Environment {
    config: Config,
    clock: VirtualTime,
    events: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    next_timer_id: u64,
    next_request_id: u64,
    nodes: HashMap<Identifier, Node>,
    latest_ring: Vec<Identifier>,
    rng: DeterministicRng,
    pending_timeouts: HashSet<(Identifier, u64)>,
    maintenance_mode: MaintenanceMode,
}

impl Environment {
    pub fn new(seed: u64) -> Self {
        Self::with_config(Config::default(), seed)
    }

    pub fn with_config(config: Config, seed: u64) -> Self {
        Environment {
            config,
            clock: VirtualTime::ZERO,
            events: BinaryHeap::new(),
            next_seq: 0,
            next_timer_id: 0,
            next_request_id: 0,
            nodes: HashMap::new(),
            latest_ring: Vec::new(),
            rng: DeterministicRng::new(seed),
            pending_timeouts: HashSet::new(),
            maintenance_mode: MaintenanceMode::PerNode,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn nodes(&self) -> &HashMap<Identifier, Node> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut HashMap<Identifier, Node> {
        &mut self.nodes
    }

    pub fn latest_ring(&self) -> &[Identifier] {
        &self.latest_ring
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn current_time(&self) -> VirtualTime {
        self.clock
    }

    pub fn maintenance_mode(&self) -> MaintenanceMode {
        self.maintenance_mode
    }

    pub fn set_maintenance_mode(&mut self, mode: MaintenanceMode) {
        self.maintenance_mode = mode;
    }

    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.node_id.clone(), node);
        self.refresh_latest_ring();
    }

    /// Recomputes the sorted active-node snapshot. Called automatically
    /// after every join/fail; drivers that flip `node.active` directly
    /// (rather than through [`EventKind::NodeFail`]) must call this too.
    pub fn refresh_latest_ring(&mut self) {
        let mut ring: Vec<Identifier> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.active)
            .map(|(id, _)| id.clone())
            .collect();
        ring.sort();
        self.latest_ring = ring;
    }

    pub fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub fn schedule_event(&mut self, delay: Duration, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(ScheduledEvent {
            time: self.clock + delay,
            seq,
            kind,
        });
    }

    pub fn schedule_timer(&mut self, node_id: Identifier, delay: Duration) -> u64 {
        let timer_id = self.next_timer_id;
        self.next_timer_id += 1;
        self.pending_timeouts.insert((node_id.clone(), timer_id));
        self.schedule_event(delay, EventKind::TimeoutExpired { node_id, timer_id });
        timer_id
    }

    /// Removes a pending timer so its eventual `TimeoutExpired` fires as
    /// a no-op. The only cancellation path in the model.
    pub fn cancel_timer(&mut self, node_id: Identifier, timer_id: u64) {
        self.pending_timeouts.remove(&(node_id, timer_id));
    }

    pub fn send_message(&mut self, src: Identifier, dst: Identifier, rpc: Rpc) {
        self.schedule_event(Duration::ZERO, EventKind::SendMessage { src, dst, rpc });
    }

    pub fn schedule_stabilize_tick(&mut self, node_id: Identifier) {
        let interval = self.config.stabilize_interval();
        self.schedule_event(interval, EventKind::StabilizeTick { node_id });
    }

    /// `4 * base_latency * log2(active_nodes)`, floored at `4 * base_latency`.
    pub fn timeout_duration(&self) -> Duration {
        let active = self.nodes.values().filter(|n| n.active).count().max(1);
        let base = self.config.base_latency().as_secs_f64();
        let secs = (4.0 * base * (active as f64).log2()).max(4.0 * base);
        Duration::from_secs_f64(secs)
    }

    fn dispatch(&mut self, event: ScheduledEvent) {
        match event.kind {
            EventKind::NodeJoin { node_id } => self.dispatch_node_join(node_id),
            EventKind::NodeFail { node_id } => self.dispatch_node_fail(node_id),
            EventKind::SendMessage { src, dst, rpc } => {
                let latency = self.config.base_latency();
                self.schedule_event(latency, EventKind::ReceiveMessage { src, dst, rpc });
            }
            EventKind::ReceiveMessage { src, dst, rpc } => self.dispatch_receive(src, dst, rpc),
            EventKind::TimeoutExpired { node_id, timer_id } => {
                self.dispatch_timeout(node_id, timer_id)
            }
            EventKind::StabilizeTick { node_id } => self.dispatch_stabilize_tick(node_id),
            EventKind::Lookup { start_id, key_id } => self.dispatch_lookup(start_id, key_id),
        }
    }

    fn dispatch_node_join(&mut self, node_id: Option<Identifier>) {
        let bootstrap_id = if self.nodes.is_empty() {
            None
        } else {
            match node_id {
                Some(id) => Some(id),
                None => self.nodes.keys().min().cloned(),
            }
        };
        let new_id = node::join(self, bootstrap_id.clone(), None, false);
        debug!(node_id = %new_id, bootstrap = ?bootstrap_id, "node joined");
    }

    fn dispatch_node_fail(&mut self, node_id: Option<Identifier>) {
        let failed = match node_id {
            Some(id) => Some(id),
            None => {
                // Sourced from `latest_ring` (sorted, deterministic) rather
                // than iterating `self.nodes` directly: a `HashMap`'s
                // iteration order is randomized per-process and would make
                // the chosen victim depend on memory layout instead of the
                // seed.
                let live = &self.latest_ring;
                if live.len() <= 1 {
                    None
                } else {
                    self.rng.choose(live).cloned()
                }
            }
        };
        if let Some(id) = &failed {
            if let Some(node) = self.nodes.get_mut(id) {
                node.active = false;
            }
        }
        self.refresh_latest_ring();
        if let Some(id) = failed {
            debug!(node_id = %id, "node failed");
        }
    }

    fn dispatch_receive(&mut self, src: Identifier, dst: Identifier, rpc: Rpc) {
        if let Some(mut target) = self.nodes.remove(&dst) {
            if target.active {
                trace!(src = %src, dst = %dst, "rpc delivered");
                node::rpc::handle(&mut target, self, &src, rpc);
            }
            self.nodes.insert(dst, target);
        }
    }

    fn dispatch_timeout(&mut self, node_id: Identifier, timer_id: u64) {
        if !self.pending_timeouts.remove(&(node_id.clone(), timer_id)) {
            return;
        }
        if let Some(mut target) = self.nodes.remove(&node_id) {
            if target.active {
                target.handle_timeout(self, timer_id);
            }
            self.nodes.insert(node_id, target);
        }
    }

    fn dispatch_stabilize_tick(&mut self, node_id: Identifier) {
        let Some(mut target) = self.nodes.remove(&node_id) else {
            return;
        };
        if target.active {
            target.handle_stabilize_tick(self);
        }
        let reschedule = target.active && self.maintenance_mode == MaintenanceMode::PerNode;
        self.nodes.insert(node_id.clone(), target);
        if reschedule {
            self.schedule_stabilize_tick(node_id);
        }
    }

    fn dispatch_lookup(&mut self, start_id: Identifier, key_id: Identifier) {
        node::lookup::lookup_iterative(self, &start_id, &key_id, true);
    }

    /// Advances the clock to `until`, dispatching every event due by then.
    pub fn run_until(&mut self, until: VirtualTime) {
        while let Some(event) = self.events.peek() {
            if event.time > until {
                break;
            }
            let event = self.events.pop().expect("just peeked");
            self.clock = event.time;
            self.dispatch(event);
        }
        if self.clock < until {
            self.clock = until;
        }
    }

    /// Drains the event queue to quiescence.
    pub fn run(&mut self) {
        while let Some(event) = self.events.pop() {
            self.clock = event.time;
            self.dispatch(event);
        }
    }
}

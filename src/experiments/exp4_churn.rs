//! Churn experiment (§4.10d), grounded in `experiments/exp_4_churn.py`.
//!
//! Runs in [`crate::MaintenanceMode::Batched`]: a global stabilizer sweep
//! fires once per `stabilize_interval` instead of each node driving its
//! own ticks, exactly as the original replaces `Node._schedule_stabilize`
//! with a no-op and drives maintenance from an external batch loop. Join,
//! fail, and lookup events arrive on independent Poisson processes.

use crate::config::Config;
use crate::environment::{Environment, MaintenanceMode};
use crate::event::EventKind;
use crate::identifier::{modulus, random_identifier};
use crate::maintenance::{global_stabilizer_tick, warm_up};
use crate::node;
use crate::time::{Duration, VirtualTime};

#[derive(Debug, Clone, Copy)]
pub struct ChurnReplicate {
    pub issued: u64,
    pub failed: u64,
    pub fail_fraction: f64,
}

pub fn run_churn_batch(
    no_of_nodes: usize,
    join_fail_rate: f64,
    lookup_rate: f64,
    simulation_time_secs: f64,
    no_of_replicates: usize,
    seed: u64,
    bits: u32,
) -> Vec<ChurnReplicate> {
    (0..no_of_replicates)
        .map(|r| run_one(no_of_nodes, join_fail_rate, lookup_rate, simulation_time_secs, seed + r as u64, bits))
        .collect()
}

fn run_one(
    no_of_nodes: usize,
    join_fail_rate: f64,
    lookup_rate: f64,
    simulation_time_secs: f64,
    seed: u64,
    bits: u32,
) -> ChurnReplicate {
    let mut env = Environment::with_config(Config { bits, ..Default::default() }, seed);
    env.set_maintenance_mode(MaintenanceMode::Batched);

    let first = node::join(&mut env, None, None, true);
    for _ in 1..no_of_nodes {
        node::join(&mut env, Some(first.clone()), None, true);
    }
    warm_up(&mut env);

    schedule_poisson_events(&mut env, join_fail_rate, lookup_rate, simulation_time_secs, bits);

    let simulation_time = VirtualTime::from_secs_f64(simulation_time_secs);
    let interval = env.config().stabilize_interval();
    let mut next_tick = env.current_time() + interval;
    while next_tick <= simulation_time {
        env.run_until(next_tick);
        global_stabilizer_tick(&mut env);
        next_tick = next_tick + interval;
    }
    env.run_until(simulation_time);

    let issued: u64 = env.nodes().values().map(|n| n.lookups).sum();
    let failed: u64 = env.nodes().values().map(|n| n.lookup_fail).sum();
    let fail_fraction = if issued > 0 { failed as f64 / issued as f64 } else { 0.0 };

    ChurnReplicate { issued, failed, fail_fraction }
}

/// Schedules independent Poisson-process join, fail, and lookup event
/// trains up to `simulation_time_secs`, exactly as the original generates
/// three separate `poisson(rate)` draws and merges them by timestamp. Must
/// run before the clock advances past zero, since each draw is scheduled
/// as a delay from the environment's current time.
fn schedule_poisson_events(env: &mut Environment, join_fail_rate: f64, lookup_rate: f64, simulation_time_secs: f64, bits: u32) {
    for t in poisson_arrivals(env, join_fail_rate, simulation_time_secs) {
        env.schedule_event(Duration::from_secs_f64(t), EventKind::NodeJoin { node_id: None });
    }
    for t in poisson_arrivals(env, join_fail_rate, simulation_time_secs) {
        env.schedule_event(Duration::from_secs_f64(t), EventKind::NodeFail { node_id: None });
    }
    let modulus = modulus(bits);
    for t in poisson_arrivals(env, lookup_rate, simulation_time_secs) {
        let ring = env.latest_ring().to_vec();
        let Some(start) = env.rng().choose(&ring).cloned() else { continue };
        let key = random_identifier(env.rng(), bits) % &modulus;
        env.schedule_event(Duration::from_secs_f64(t), EventKind::Lookup { start_id: start, key_id: key });
    }
}

fn poisson_arrivals(env: &mut Environment, rate: f64, horizon_secs: f64) -> Vec<f64> {
    if rate <= 0.0 {
        return Vec::new();
    }
    let mut t = 0.0;
    let mut arrivals = Vec::new();
    loop {
        t += env.rng().exponential(rate);
        if t > horizon_secs {
            break;
        }
        arrivals.push(t);
    }
    arrivals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_churn_keeps_failure_rate_small() {
        let reps = run_churn_batch(60, 0.01, 1.0, 600.0, 2, 13, 12);
        for rep in &reps {
            if rep.issued > 0 {
                assert!(rep.fail_fraction < 0.5, "fail_fraction = {}", rep.fail_fraction);
            }
        }
    }
}

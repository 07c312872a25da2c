//! Mass-failure experiment (§4.10c), grounded in
//! `experiments/exp_3_mass_failure.py`.
//!
//! Bootstraps a full ring, warms it up to a converged steady state,
//! records the pre-crash owner of a batch of random keys, fails a
//! fraction of the ring simultaneously, re-warms (which only ever
//! touches active nodes, so it is safe to call again post-crash exactly
//! as the original reuses it), and measures what fraction of lookups now
//! land on the wrong owner.

use crate::config::Config;
use crate::environment::Environment;
use crate::identifier::{modulus, owner_in_ring, random_identifier, Identifier};
use crate::maintenance::warm_up;
use crate::node;
use crate::node::lookup::lookup_iterative;

#[derive(Debug, Clone, Copy)]
pub struct MassFailureReplicate {
    pub fail_fraction: f64,
}

pub fn run_mass_failure_batch(
    no_of_nodes: usize,
    frac_failed: f64,
    no_of_keys: usize,
    no_of_replicates: usize,
    seed: u64,
    bits: u32,
) -> Vec<MassFailureReplicate> {
    (0..no_of_replicates)
        .map(|r| run_one(no_of_nodes, frac_failed, no_of_keys, seed + r as u64, bits))
        .collect()
}

fn run_one(no_of_nodes: usize, frac_failed: f64, no_of_keys: usize, seed: u64, bits: u32) -> MassFailureReplicate {
    let mut env = Environment::with_config(Config { bits, ..Default::default() }, seed);

    let first = node::join(&mut env, None, None, false);
    for _ in 1..no_of_nodes {
        node::join(&mut env, Some(first.clone()), None, false);
    }
    warm_up(&mut env);

    let modulus = modulus(bits);
    let keys: Vec<Identifier> = (0..no_of_keys).map(|_| random_identifier(env.rng(), bits) % &modulus).collect();
    let owners: Vec<Identifier> = keys.iter().map(|k| owner_in_ring(env.latest_ring(), k)).collect();

    let ring = env.latest_ring().to_vec();
    let n_to_fail = (frac_failed * ring.len() as f64) as usize;
    let mut shuffled = ring.clone();
    env.rng().shuffle(&mut shuffled);
    let failed: Vec<Identifier> = shuffled.into_iter().take(n_to_fail).collect();
    for id in &failed {
        if let Some(n) = env.nodes_mut().get_mut(id) {
            n.active = false;
        }
    }
    env.refresh_latest_ring();
    warm_up(&mut env);

    let live = env.latest_ring().to_vec();
    if live.is_empty() {
        return MassFailureReplicate { fail_fraction: 1.0 };
    }

    let mut fail = 0usize;
    for (key, owner) in keys.iter().zip(owners.iter()) {
        let start = env.rng().choose(&live).cloned().unwrap();
        let outcome = lookup_iterative(&mut env, &start, key, false);
        if outcome.resolved.as_ref() != Some(owner) {
            fail += 1;
        }
    }

    MassFailureReplicate { fail_fraction: fail as f64 / no_of_keys as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_failure_fraction_keeps_most_lookups_correct() {
        let reps = run_mass_failure_batch(200, 0.05, 500, 3, 7, 12);
        for rep in &reps {
            assert!(rep.fail_fraction < 0.5, "fail_fraction = {}", rep.fail_fraction);
        }
    }
}

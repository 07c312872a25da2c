//! Load-balance experiment (§4.10a), grounded in
//! `experiments/exp_1_load_balance.py`.
//!
//! Generates node identifiers directly (optionally several "virtual"
//! identifiers per physical node, to measure the standard virtual-node
//! load-balancing technique) and assigns random keys to the clockwise
//! successor among the sorted identifiers, entirely in memory — no
//! [`crate::Environment`] or message passing is involved, matching the
//! original, which never constructs a `SimEnvironment` for this
//! experiment either.

use crate::identifier::{modulus, random_identifier, Identifier};
use crate::rng::DeterministicRng;

/// Per-physical-node key counts for one replicate.
#[derive(Debug, Clone)]
pub struct LoadBalanceReplicate {
    pub loads: Vec<u64>,
}

/// Runs `no_of_replicates` independent trials of `no_of_nodes` physical
/// nodes (each contributing `v` virtual identifiers when `use_virtual` is
/// set) absorbing `no_of_keys` uniformly random keys.
pub fn run_load_balance_batch(
    no_of_nodes: usize,
    no_of_keys: usize,
    no_of_replicates: usize,
    seed: u64,
    bits: u32,
    use_virtual: bool,
    v: usize,
) -> Vec<LoadBalanceReplicate> {
    (0..no_of_replicates)
        .map(|r| {
            let mut rng = DeterministicRng::new(seed + r as u64);
            run_one(no_of_nodes, no_of_keys, &mut rng, bits, use_virtual, v)
        })
        .collect()
}

fn run_one(
    no_of_nodes: usize,
    no_of_keys: usize,
    rng: &mut DeterministicRng,
    bits: u32,
    use_virtual: bool,
    v: usize,
) -> LoadBalanceReplicate {
    let per_physical = if use_virtual { v.max(1) } else { 1 };

    let mut pairs: Vec<(Identifier, usize)> = Vec::with_capacity(no_of_nodes * per_physical);
    for pid in 0..no_of_nodes {
        for _ in 0..per_physical {
            pairs.push((random_identifier(rng, bits), pid));
        }
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let ids: Vec<Identifier> = pairs.iter().map(|(id, _)| id.clone()).collect();

    let mut loads = vec![0u64; no_of_nodes];
    let modulus = modulus(bits);
    for _ in 0..no_of_keys {
        let key = random_identifier(rng, bits) % &modulus;
        let idx = ids.partition_point(|id| id < &key);
        let idx = if idx == ids.len() { 0 } else { idx };
        loads[pairs[idx].1] += 1;
    }

    LoadBalanceReplicate { loads }
}

/// Mean, 1st and 99th percentile key count across all physical nodes and
/// replicates, for Figure-8a/9-style summaries.
pub fn summarize_load_balance(replicates: &[LoadBalanceReplicate]) -> (f64, u64, u64) {
    let mut all: Vec<u64> = replicates.iter().flat_map(|r| r.loads.iter().copied()).collect();
    if all.is_empty() {
        return (0.0, 0, 0);
    }
    all.sort_unstable();
    let mean = all.iter().sum::<u64>() as f64 / all.len() as f64;
    let p1 = percentile(&all, 1.0);
    let p99 = percentile(&all, 99.0);
    (mean, p1, p99)
}

fn percentile(sorted: &[u64], pct: f64) -> u64 {
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_physical_node_absorbs_every_key() {
        let reps = run_load_balance_batch(1, 1000, 3, 0, 8, false, 1);
        for rep in &reps {
            assert_eq!(rep.loads, vec![1000]);
        }
    }

    #[test]
    fn virtual_nodes_reduce_load_variance() {
        let bits = 12;
        let plain = run_load_balance_batch(50, 5000, 5, 1, bits, false, 1);
        let virtual_ = run_load_balance_batch(50, 5000, 5, 1, bits, true, 10);
        let variance = |reps: &[LoadBalanceReplicate]| -> f64 {
            let all: Vec<f64> = reps.iter().flat_map(|r| r.loads.iter().map(|&x| x as f64)).collect();
            let mean = all.iter().sum::<f64>() / all.len() as f64;
            all.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / all.len() as f64
        };
        assert!(variance(&virtual_) < variance(&plain));
    }
}

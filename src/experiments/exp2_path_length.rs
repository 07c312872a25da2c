//! Path-length experiment (§4.10b), grounded in
//! `experiments/exp_2_path_length.py`.
//!
//! Builds a perfectly stabilized, static finger table for a sorted set of
//! random identifiers and measures hop counts for one lookup per node,
//! entirely without an [`crate::Environment`] — matching the original,
//! which computes `finger_map` by hand rather than stabilizing a
//! simulated ring.

use crate::identifier::{finger_start, in_interval, modulus, random_identifier, Identifier};
use crate::rng::DeterministicRng;

#[derive(Debug, Clone)]
pub struct PathLengthResult {
    pub no_of_nodes: usize,
    pub hops: Vec<usize>,
}

pub fn run_path_length_batch(
    sizes: &[usize],
    no_of_replicates: usize,
    seed: u64,
    bits: u32,
) -> Vec<PathLengthResult> {
    sizes
        .iter()
        .map(|&n| {
            let mut hops = Vec::with_capacity(n * no_of_replicates);
            for r in 0..no_of_replicates {
                let mut rng = DeterministicRng::new(seed + r as u64);
                hops.extend(run_one(n, &mut rng, bits));
            }
            PathLengthResult { no_of_nodes: n, hops }
        })
        .collect()
}

fn run_one(no_of_nodes: usize, rng: &mut DeterministicRng, bits: u32) -> Vec<usize> {
    let mut nodes: Vec<Identifier> = (0..no_of_nodes).map(|_| random_identifier(rng, bits)).collect();
    nodes.sort();

    // finger_map[idx][b] = index into `nodes` owning finger_start(nodes[idx], b)
    let finger_map: Vec<Vec<usize>> = nodes
        .iter()
        .map(|nid| {
            (0..bits)
                .map(|b| {
                    let target = finger_start(nid, b, bits);
                    let j = nodes.partition_point(|id| id < &target);
                    if j == no_of_nodes { 0 } else { j }
                })
                .collect()
        })
        .collect();

    let modulus = modulus(bits);
    let mut all_hops = Vec::with_capacity(no_of_nodes);
    for start_idx in 0..no_of_nodes {
        let key = random_identifier(rng, bits) % &modulus;
        all_hops.push(path_length_for(&nodes, &finger_map, start_idx, &key, bits));
    }
    all_hops
}

fn path_length_for(
    nodes: &[Identifier],
    finger_map: &[Vec<usize>],
    start_idx: usize,
    key: &Identifier,
    bits: u32,
) -> usize {
    let mut curr = start_idx;
    let mut hops = 0usize;
    loop {
        hops += 1;
        let successor_idx = finger_map[curr][0];
        let successor_id = &nodes[successor_idx];
        if in_interval(key, &nodes[curr], successor_id, false, true, bits) {
            break;
        }

        let mut advanced = false;
        for i in (0..bits as usize).rev() {
            let next_idx = finger_map[curr][i];
            let nid_i = &nodes[next_idx];
            if in_interval(nid_i, &nodes[curr], key, false, false, bits) {
                curr = next_idx;
                advanced = true;
                break;
            }
        }
        if !advanced {
            curr = successor_idx;
        }
    }
    hops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_ring_resolves_in_one_hop() {
        let results = run_path_length_batch(&[1], 5, 0, 8);
        assert!(results[0].hops.iter().all(|&h| h == 1));
    }

    #[test]
    fn hop_count_grows_sublinearly_with_ring_size() {
        let results = run_path_length_batch(&[64, 4096], 3, 42, 16);
        let mean = |hops: &[usize]| hops.iter().sum::<usize>() as f64 / hops.len() as f64;
        assert!(mean(&results[1].hops) > mean(&results[0].hops));
        assert!(mean(&results[1].hops) < 2.0 * (mean(&results[0].hops) + 6.0));
    }
}

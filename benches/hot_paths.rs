//! Hot path benchmarks for profiling-driven optimization.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! These benchmarks measure the microsecond-level hot paths that dominate
//! simulation throughput at high node counts: ring arithmetic, finger
//! routing, and iterative lookup.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use chord_sim::identifier::{finger_start, in_interval, random_identifier};
use chord_sim::node;
use chord_sim::{Config, DeterministicRng, Environment};

fn bench_in_interval(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_interval");
    group.throughput(Throughput::Elements(1));

    let mut rng = DeterministicRng::new(1);
    let key = random_identifier(&mut rng, 160);
    let start = random_identifier(&mut rng, 160);
    let end = random_identifier(&mut rng, 160);

    group.bench_function("160_bit", |b| {
        b.iter(|| in_interval(black_box(&key), black_box(&start), black_box(&end), false, true, 160))
    });
    group.finish();
}

fn bench_finger_start(c: &mut Criterion) {
    let mut group = c.benchmark_group("finger_start");
    let mut rng = DeterministicRng::new(2);
    let id = random_identifier(&mut rng, 160);

    group.bench_function("160_bit", |b| {
        b.iter(|| finger_start(black_box(&id), black_box(42), 160))
    });
    group.finish();
}

fn bench_find_successor_local(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_successor_local");

    for n in [100usize, 1_000] {
        let mut env = Environment::with_config(Config { bits: 32, ..Default::default() }, 3);
        let first = node::join(&mut env, None, None, false);
        for _ in 1..n {
            node::join(&mut env, Some(first.clone()), None, false);
        }
        env.run_until(chord_sim::VirtualTime::from_secs_f64(60.0));
        let key = random_identifier(env.rng(), 32);

        group.bench_function(format!("n_{}", n), |b| {
            b.iter(|| node::find_successor_local(black_box(&env), black_box(&first), black_box(&key)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_in_interval, bench_finger_start, bench_find_successor_local);
criterion_main!(benches);

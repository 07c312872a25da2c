use chord_sim::experiments::{
    run_churn_batch, run_load_balance_batch, run_mass_failure_batch, run_path_length_batch,
};
use chord_sim::{node, Config, Environment};

fn main() {
    chord_sim::telemetry::init_tracing();

    println!("=== Chord DHT Simulator ===\n");

    demo_join_and_stabilize();
    demo_load_balance();
    demo_path_length();
    demo_mass_failure();
    demo_churn();

    println!("\n=== All scenarios completed ===");
}

fn demo_join_and_stabilize() {
    println!("--- Scenario: join and converge an 8-node ring ---");
    let mut env = Environment::with_config(Config { bits: 16, ..Default::default() }, 1);
    let first = node::join(&mut env, None, None, false);
    for _ in 0..7 {
        node::join(&mut env, Some(first.clone()), None, false);
    }
    env.run_until(chord_sim::VirtualTime::from_secs_f64(30.0));
    println!("ring size after convergence: {}\n", env.latest_ring().len());
}

fn demo_load_balance() {
    println!("--- Scenario: load balance, with and without virtual nodes ---");
    let plain = run_load_balance_batch(100, 5_000, 5, 1, 20, false, 1);
    let virtual_ = run_load_balance_batch(100, 5_000, 5, 1, 20, true, 10);
    let (mean_plain, p1_plain, p99_plain) = chord_sim::experiments::exp1_load_balance::summarize_load_balance(&plain);
    let (mean_virtual, p1_virtual, p99_virtual) =
        chord_sim::experiments::exp1_load_balance::summarize_load_balance(&virtual_);
    println!("plain:   mean={mean_plain:.1} p1={p1_plain} p99={p99_plain}");
    println!("virtual: mean={mean_virtual:.1} p1={p1_virtual} p99={p99_virtual}\n");
}

fn demo_path_length() {
    println!("--- Scenario: path length vs. ring size ---");
    for result in run_path_length_batch(&[64, 1024, 4096], 3, 42, 20) {
        let mean = result.hops.iter().sum::<usize>() as f64 / result.hops.len() as f64;
        println!("n={:>5}  mean hops={mean:.2}", result.no_of_nodes);
    }
    println!();
}

fn demo_mass_failure() {
    println!("--- Scenario: mass failure ---");
    for frac in [0.01, 0.05, 0.1, 0.2] {
        let reps = run_mass_failure_batch(500, frac, 2_000, 3, 7, 16);
        let mean = reps.iter().map(|r| r.fail_fraction).sum::<f64>() / reps.len() as f64;
        println!("frac_failed={frac:.2}  mean_lookup_fail={mean:.4}");
    }
    println!();
}

fn demo_churn() {
    println!("--- Scenario: churn ---");
    for rate in [0.01, 0.05, 0.1] {
        let reps = run_churn_batch(100, rate, 1.0, 1_200.0, 2, 13, 14);
        let mean = reps.iter().map(|r| r.fail_fraction).sum::<f64>() / reps.len() as f64;
        println!("join_fail_rate={rate:.2}  mean_lookup_fail={mean:.4}");
    }
}

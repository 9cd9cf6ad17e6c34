/// Benchmarks stepping random networks of independent
/// origin-link-link-destination chains, to track the per-junction query
/// overhead as the network grows.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metanet_core::engine::{NumericEngine, VarInit};
use metanet_core::simulation::SimulationConfig;
use metanet_core::test_utils::make_random_network;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn step_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_networks");
    let engine = NumericEngine::new(VarInit::Fill(20.0));
    let config = SimulationConfig::default();

    for num_systems in [10usize, 100] {
        // ChaCha8 is consistent across builds and platforms
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let network = make_random_network(num_systems, &mut rng).unwrap();
        let state = network.initial_state(&engine);

        group.throughput(Throughput::Elements(num_systems as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_systems),
            &num_systems,
            |b, _| b.iter(|| network.step(&state, &engine, &config).unwrap()),
        );
    }
    group.finish();
}

criterion_group!(benches, step_benchmark);
criterion_main!(benches);

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use neuroblob_core::{SimulationConfig, World};

fn world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for (label, agents) in [("sparse", 10_usize), ("crowded", 60_usize)] {
        let config = SimulationConfig {
            rng_seed: Some(42),
            agent_count: agents,
            ..SimulationConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(label), &config, |b, config| {
            b.iter_batched(
                || World::new(config.clone()).expect("bench world"),
                |mut world| {
                    for _ in 0..32 {
                        world.step();
                    }
                    world
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, world_step);
criterion_main!(benches);

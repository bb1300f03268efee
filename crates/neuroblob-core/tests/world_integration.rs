//! End-to-end behavior of the world and its generation loop.

use neuroblob_core::{
    ControlCommand, GenerationManager, NeuroBlob, ObjectKind, SimulationConfig, World,
    apply_control_command,
};

fn seeded_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        rng_seed: Some(seed),
        ..SimulationConfig::default()
    }
}

#[test]
fn seeded_runs_are_identical() {
    let mut left = GenerationManager::new(seeded_config(99)).expect("left manager");
    let mut right = GenerationManager::new(seeded_config(99)).expect("right manager");

    for _ in 0..300 {
        left.advance();
        right.advance();
    }

    assert_eq!(left.generation(), right.generation());
    assert_eq!(left.fitness_series(), right.fitness_series());
    assert_eq!(left.world().snapshot(), right.world().snapshot());
}

#[test]
fn long_run_keeps_counts_and_invariants() {
    let config = seeded_config(1234);
    let mut world = World::new(config.clone()).expect("world");

    for _ in 0..500 {
        world.step();
        assert_eq!(world.ids_of(ObjectKind::Food).len(), config.food_count);
        assert_eq!(world.ids_of(ObjectKind::Poison).len(), config.poison_count);
    }

    let snapshot = world.snapshot();
    for object in &snapshot.objects {
        assert!(object.position.x.is_finite() && object.position.y.is_finite());
        if object.kind != ObjectKind::Wall {
            assert!(object.position.x > -50.0 && object.position.x < config.world_width + 50.0);
            assert!(object.position.y > -50.0 && object.position.y < config.world_height + 50.0);
        }
        assert!((0.0..=1.0).contains(&object.health));
        assert!((0.0..=1.0).contains(&object.energy));
    }
    for agent in &snapshot.agents {
        assert_eq!(agent.vision.len(), config.vision_inputs());
        for value in &agent.vision {
            assert!((0.0..=1.0).contains(value), "vision value {value} escaped [0, 1]");
        }
    }
}

#[test]
fn evolution_rolls_generations_and_records_fitness() {
    let config = SimulationConfig {
        rng_seed: Some(2024),
        agent_count: 5,
        generation_tick_budget: 50,
        ..SimulationConfig::default()
    };
    let mut manager = GenerationManager::new(config).expect("manager");

    while manager.generation() <= 5 {
        manager.advance();
    }

    let series = manager.fitness_series();
    assert_eq!(series.len(), 5);
    for (index, sample) in series.iter().enumerate() {
        assert_eq!(sample.generation, index as u64 + 1);
        assert!(sample.ticks >= 1 && sample.ticks <= 50);
    }
    assert_eq!(manager.world().live_agents(), 5);
    assert_eq!(manager.ticks_in_generation(), 0);
}

#[test]
fn controller_survives_a_manager_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lineage.json");

    let mut first = GenerationManager::new(SimulationConfig {
        agent_count: 3,
        ..seeded_config(31)
    })
    .expect("first manager");
    first.advance();
    apply_control_command(&mut first, ControlCommand::SaveController(path.clone()));
    let saved = NeuroBlob::load(first.config().brain_topology(), &path).expect("saved controller");

    let mut second = GenerationManager::new(SimulationConfig {
        agent_count: 3,
        ..seeded_config(32)
    })
    .expect("second manager");
    second.preload_controller(&path);

    // The first clone is installed verbatim; the rest carry mutations.
    let heir = second.world().agent_ids()[0];
    let runtime = second.world().agent_runtime(heir).expect("runtime");
    assert_eq!(runtime.brain.weights(), saved.weights());
}

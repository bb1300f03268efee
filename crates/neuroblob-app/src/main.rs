use anyhow::{Context, Result};
use clap::Parser;
use neuroblob_core::{
    ControlCommand, FitnessSample, GenerationManager, SimulationConfig, apply_control_command,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "neuroblobs",
    version,
    about = "Evolve NeuroBlob populations headlessly and persist the best controller"
)]
struct Cli {
    /// Fixed RNG seed; omit for a different world every run.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of generations to run before exiting.
    #[arg(long, default_value_t = 10)]
    generations: u64,

    /// Ticks a generation may last; defaults to the built-in budget.
    #[arg(long)]
    tick_budget: Option<u64>,

    /// Agents per generation; defaults to the built-in population size.
    #[arg(long)]
    agents: Option<usize>,

    /// Controller JSON to seed the first population with.
    #[arg(long)]
    brain_in: Option<PathBuf>,

    /// Where to save the best controller after the run.
    #[arg(long)]
    brain_out: Option<PathBuf>,

    /// Where to write the per-generation fitness series as JSON.
    #[arg(long)]
    stats_out: Option<PathBuf>,

    /// Enable reward-modulated Hebbian learning during agent lifetimes.
    #[arg(long)]
    learning: bool,

    /// Extra population-wide mutation every N ticks; 0 disables it.
    #[arg(long, default_value_t = 0)]
    mutate_every: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli);
    let mut manager = GenerationManager::new(config)?;
    if let Some(path) = cli.brain_in.as_ref() {
        manager.preload_controller(path);
    }

    info!(
        generations = cli.generations,
        agents = manager.config().agent_count,
        learning = manager.config().learning_enabled,
        "starting NeuroBlobs evolution run"
    );

    let mut total_ticks: u64 = 0;
    while manager.generation() <= cli.generations {
        manager.advance();
        total_ticks += 1;
        if cli.mutate_every > 0 && total_ticks.is_multiple_of(cli.mutate_every) {
            apply_control_command(&mut manager, ControlCommand::MutatePopulation);
        }
    }

    if let Some(path) = cli.brain_out.as_ref() {
        apply_control_command(&mut manager, ControlCommand::SaveController(path.clone()));
    }
    if let Some(path) = cli.stats_out.as_ref() {
        write_stats(path, manager.fitness_series())?;
        info!(path = %path.display(), "wrote fitness series");
    }

    let best = manager
        .fitness_series()
        .iter()
        .map(|sample| sample.best_score)
        .max();
    info!(total_ticks, best_score = ?best, "run complete");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build_config(cli: &Cli) -> SimulationConfig {
    let mut config = SimulationConfig {
        rng_seed: cli.seed,
        learning_enabled: cli.learning,
        ..SimulationConfig::default()
    };
    if let Some(budget) = cli.tick_budget {
        config.generation_tick_budget = budget;
    }
    if let Some(agents) = cli.agents {
        config.agent_count = agents;
    }
    config
}

fn write_stats(path: &Path, series: &[FitnessSample]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create stats file at {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), series)
        .context("failed to encode fitness series")?;
    Ok(())
}

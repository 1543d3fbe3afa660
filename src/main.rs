//! Colony Forge - headless runner
//!
//! Loads a scenario, runs it for a fixed number of ticks at full speed,
//! logs what happened and prints a per-node summary.

use std::path::PathBuf;

use clap::Parser;

use colony_forge::city::recipe::RecipeCatalog;
use colony_forge::core::config::SimulationConfig;
use colony_forge::core::error::Result;
use colony_forge::ecs::world::World;
use colony_forge::simulation::tick::{run_simulation_tick, SimulationEvent};
use colony_forge::ui::state::{node_views, EventLog};
use colony_forge::world::loader::ScenarioLoader;

/// Colony Forge - run a colony scenario headless
#[derive(Parser, Debug)]
#[command(name = "colony-forge")]
#[command(about = "Run a colony production scenario and report the result")]
struct Args {
    /// Scenario file (JSON)
    #[arg(long)]
    scenario: PathBuf,

    /// Recipe catalog (TOML); the built-in stone-age catalog when omitted
    #[arg(long)]
    recipes: Option<PathBuf>,

    /// Simulation config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 500)]
    ticks: u64,

    /// Random seed, overrides the config
    #[arg(long)]
    seed: Option<u64>,

    /// Write the final world snapshot (JSON) here
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("colony_forge=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load_from_toml(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    let catalog = match &args.recipes {
        Some(path) => RecipeCatalog::load_from_toml(path)?,
        None => RecipeCatalog::with_defaults(),
    };

    let mut world = ScenarioLoader::new(catalog, config).load_from_file(&args.scenario)?;
    tracing::info!("Running {} ticks (seed {})", args.ticks, world.config.seed);

    let mut log = EventLog::new();
    let mut completed = 0usize;
    let mut cancelled = 0usize;
    for _ in 0..args.ticks {
        let tick = world.current_tick;
        let events = run_simulation_tick(&mut world);
        for event in &events {
            match event {
                SimulationEvent::TaskCompleted { .. } => completed += 1,
                SimulationEvent::TaskCancelled { .. } => cancelled += 1,
                _ => {}
            }
            tracing::debug!("[{}] {:?}", tick, event);
        }
        log.record(tick, events);
    }

    if let Err(e) = world.check_integrity() {
        tracing::error!("Integrity check failed: {}", e);
    }

    print_summary(&world, completed, cancelled, &log);

    if let Some(path) = &args.save {
        std::fs::write(path, world.to_json()?)?;
        tracing::info!("Saved snapshot to {}", path.display());
    }
    Ok(())
}

fn print_summary(world: &World, completed: usize, cancelled: usize, log: &EventLog) {
    println!("\n=== COLONY FORGE: tick {} ===", world.current_tick);
    println!(
        "Tasks completed: {}  cancelled: {}  open: {}",
        completed,
        cancelled,
        world.tasks.len()
    );
    if world.catalog_invalid {
        println!("WARNING: recipe catalog hit a cycle at runtime");
    }

    println!("\nNodes:");
    for view in node_views(world) {
        println!(
            "  #{} {} [{:?}] {:.0}%  {}",
            view.id.0, view.name, view.state, view.progress_percent, view.description
        );
        if !view.available_tasks.is_empty() {
            println!("      tasks: {}", view.available_tasks.join(", "));
        }
    }

    println!("\nWorkers:");
    for worker in world.workers.values() {
        let doing = worker
            .current_frame()
            .map(|f| format!("{} (task {})", f.kind.name(), f.task.0))
            .unwrap_or_else(|| "idle".to_string());
        println!("  {} at {}: {}", worker.name, worker.position, doing);
    }

    println!("\nItems:");
    for kind in world.ledger.kinds() {
        let live = world.items.count_kind(kind);
        if live > 0 {
            println!("  {:<14} {}", kind, live);
        }
    }

    if !log.is_empty() {
        println!("\nRecent events:");
        for entry in log.entries().rev().take(10) {
            println!("  [{}] {:?}", entry.tick, entry.event);
        }
    }
}

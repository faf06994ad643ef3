//! Meaning-Pressure Village Simulation
//!
//! Thin runner: spawn a village from role presets, run the tick schedule and
//! print the final boundary analysis as JSON.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use village_core::config::{SimConfig, DEFAULT_CONFIG_PATH};
use village_core::events::EventLogger;
use village_core::setup::{build_schedule, build_world, get_spawn_summary, population_alive};
use village_core::{boundary_analysis, SimClock};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "village_sim")]
#[command(about = "A meaning-pressure village simulation")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate (defaults to the config value)
    #[arg(long)]
    ticks: Option<u64>,

    /// Number of villagers (defaults to the config value)
    #[arg(long)]
    agents: Option<usize>,

    /// Path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write the JSONL event log here
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = if args.config.exists() {
        match SimConfig::load(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: could not load {}: {}", args.config.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        tracing::info!("no config at {}, using defaults", args.config.display());
        SimConfig::default()
    };
    if let Some(agents) = args.agents {
        config.simulation.agent_count = agents;
    }
    let ticks = args.ticks.unwrap_or(config.simulation.default_ticks);

    println!("Meaning-Pressure Village");
    println!("========================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", ticks);
    println!("Agents: {}", config.simulation.agent_count);
    println!();

    let mut world = build_world(config, args.seed);
    let summary = get_spawn_summary(&mut world);
    print!("{}", summary);

    if let Some(path) = &args.log {
        match EventLogger::new(path) {
            Ok(logger) => {
                println!("Event log: {} (run {})", path.display(), logger.run_id());
                world.insert_resource(logger);
            }
            Err(e) => {
                eprintln!("Error: could not open event log {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    let mut schedule = build_schedule();
    for tick in 1..=ticks {
        schedule.run(&mut world);

        if tick % 100 == 0 {
            let clock = world.resource::<SimClock>();
            tracing::info!(
                tick,
                season = %clock.season(),
                alive = population_alive(&world),
                "progress"
            );
        }
        if population_alive(&world) == 0 {
            tracing::info!(tick, "village is empty, stopping early");
            break;
        }
    }

    if let Some(mut logger) = world.remove_resource::<EventLogger>() {
        if let Err(e) = logger.flush() {
            eprintln!("Warning: could not flush event log: {}", e);
        }
        println!("Logged {} events", logger.event_count());
    }

    let analysis = boundary_analysis(&mut world);
    println!();
    println!(
        "Simulation complete. {} of {} villagers alive.",
        population_alive(&world),
        summary.total_agents
    );
    match serde_json::to_string_pretty(&analysis) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Warning: could not serialize boundary analysis: {}", e),
    }
}

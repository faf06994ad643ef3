//! World Setup
//!
//! Builds a seeded village world with every shared resource in place and
//! the per-tick schedule that drives it.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use village_events::SeasonClock;

use super::agents::spawn_village;
use crate::components::SimClock;
use crate::config::SimConfig;
use crate::environment::{EnvironmentHandle, VillageEnvironment};
use crate::events::{flush_event_log, TickEvents};
use crate::registry::Roster;
use crate::systems::care::advance_recovery;
use crate::systems::hunting::decay_meat;
use crate::systems::perception::{build_proximity_index, update_perception, ProximityIndex};
use crate::systems::physiology::{apply_physiological_drift, reap_dead, update_clock};
use crate::systems::trust::decay_trust_memories;
use crate::systems::turn::{run_agent_turns, TurnContext};
use crate::SimRng;

/// Create a world from config and seed: environment, shared subsystems and
/// `config.simulation.agent_count` villagers. The same seed always yields
/// the same world.
pub fn build_world(config: SimConfig, seed: u64) -> World {
    let mut rng = SmallRng::seed_from_u64(seed);
    let calendar = SeasonClock::new(config.simulation.season_length);
    let environment = VillageEnvironment::generate(
        config.simulation.world_size,
        &config.environment,
        calendar,
        &mut rng,
    );
    tracing::debug!(sites = environment.sites().len(), "environment generated");

    let agent_count = config.simulation.agent_count;
    let mut world = World::new();
    world.insert_resource(Roster::new());
    world.insert_resource(SimClock::new(config.simulation.season_length));
    world.insert_resource(ProximityIndex::new());
    TurnContext::new(config, SimRng(rng), EnvironmentHandle::new(environment)).restore(&mut world);

    if let Some(mut sim_rng) = world.remove_resource::<SimRng>() {
        spawn_village(&mut world, agent_count, &mut sim_rng.0);
        world.insert_resource(sim_rng);
    }
    world
}

/// The per-tick pipeline, fully ordered
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            update_clock,
            (build_proximity_index, update_perception).chain(),
            apply_physiological_drift,
            run_agent_turns,
            (decay_trust_memories, decay_meat, advance_recovery).chain(),
            reap_dead,
            flush_event_log,
        )
            .chain(),
    );
    schedule
}

/// Run `ticks` ticks of the schedule
pub fn run_ticks(world: &mut World, schedule: &mut Schedule, ticks: u64) {
    for _ in 0..ticks {
        schedule.run(world);
    }
}

/// Living agents left in the world
pub fn population_alive(world: &World) -> usize {
    world.get_resource::<Roster>().map_or(0, |roster| {
        roster.iter().filter(|(id, _)| roster.is_alive(world, *id)).count()
    })
}

/// Events still buffered for the current tick
pub fn pending_events(world: &World) -> usize {
    world.get_resource::<TickEvents>().map_or(0, |events| events.len())
}

//! Test fixtures shared by the subsystem tests

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use village_events::SeasonClock;

use super::turn::TurnContext;
use crate::components::{AgentId, Position, Role, SimClock, Site};
use crate::config::SimConfig;
use crate::environment::{EnvironmentHandle, VillageEnvironment};
use crate::registry::Roster;
use crate::setup::spawn_villager;
use crate::SimRng;

/// A world holding only the roster and clock, with the turn context kept
/// outside it. The environment has no sites.
pub fn test_world(config: SimConfig, seed: u64) -> (World, TurnContext) {
    test_world_with_sites(config, seed, Vec::new())
}

pub fn test_world_with_sites(
    config: SimConfig,
    seed: u64,
    sites: Vec<Site>,
) -> (World, TurnContext) {
    let mut world = World::new();
    world.insert_resource(Roster::new());
    world.insert_resource(SimClock::new(config.simulation.season_length));
    let environment = VillageEnvironment::new(
        config.simulation.world_size,
        sites,
        SeasonClock::new(config.simulation.season_length),
    );
    let ctx = TurnContext::new(
        config,
        SimRng(SmallRng::seed_from_u64(seed)),
        EnvironmentHandle::new(environment),
    );
    (world, ctx)
}

/// Spawn a villager with the role's preset traits and no knowledge
pub fn spawn_test_agent(world: &mut World, role: Role, position: Position) -> AgentId {
    spawn_villager(world, role, position, format!("test {}", role.name()))
}

//! Agent Spawning
//!
//! Spawn villagers from role presets, scatter them over the map and seed
//! what each one already knows about its surroundings.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

use crate::components::{
    Agent, AgentId, AgentName, Health, HuntRecord, Knowledge, Physiology, Position, Role, Site,
    SiteKind, TerritoryLink,
};
use crate::environment::EnvironmentHandle;
use crate::movement::distance;
use crate::registry::spawn_agent;
use crate::systems::coherence::CoherenceLedger;
use crate::systems::exploration::Exploration;
use crate::systems::perception::Nearby;

/// Sites within this distance of the spawn point start out known
pub const HOME_KNOWLEDGE_RADIUS: f32 = 30.0;

const VILLAGER_NAMES: &[&str] = &[
    "Ash", "Birch", "Bryn", "Cedar", "Dale", "Elm", "Fern", "Finch", "Flint", "Glen",
    "Hazel", "Heath", "Ivy", "Kestrel", "Lark", "Moss", "Oak", "Reed", "Rowan", "Sage",
    "Sorrel", "Stone", "Thorn", "Wren",
];

fn generate_name(index: usize, role: Role) -> String {
    let base = VILLAGER_NAMES[index % VILLAGER_NAMES.len()];
    let generation = index / VILLAGER_NAMES.len();
    if generation == 0 {
        format!("{} the {}", base, role.name())
    } else {
        format!("{} {} the {}", base, generation + 1, role.name())
    }
}

/// Spawn one villager with every capability component at its starting value
pub fn spawn_villager(world: &mut World, role: Role, position: Position, name: String) -> AgentId {
    spawn_agent(
        world,
        (
            Agent,
            AgentName(name),
            role,
            role.traits(),
            position,
            Physiology::default(),
            Health::default(),
            HuntRecord::default(),
            TerritoryLink::default(),
            Knowledge::new(),
            CoherenceLedger::new(),
            Exploration::new(),
            Nearby::new(),
        ),
    )
}

/// What a villager knows at spawn: every site close to home, plus the
/// nearest water wherever it is
pub fn initial_knowledge(environment: &EnvironmentHandle, position: Position) -> Knowledge {
    let mut knowledge = Knowledge::new();
    for site in environment.0.sites_within(position, HOME_KNOWLEDGE_RADIUS) {
        knowledge.learn(site);
    }
    let reach = environment.0.world_size() * 2.0;
    let water = environment
        .0
        .sites_within(position, reach)
        .into_iter()
        .filter(|s| s.kind == SiteKind::Water)
        .min_by(|a, b| {
            distance(position, a.cell.to_position())
                .total_cmp(&distance(position, b.cell.to_position()))
                .then_with(|| a.cell.cmp(&b.cell))
        });
    if let Some(site) = water {
        knowledge.learn(site);
    }
    knowledge
}

/// Spawn `count` villagers, cycling through the role presets, at random
/// positions on the map
pub fn spawn_village(world: &mut World, count: usize, rng: &mut SmallRng) -> Vec<AgentId> {
    let size = world
        .get_resource::<EnvironmentHandle>()
        .map_or(100.0, |env| env.0.world_size());
    let roles = Role::all();
    let mut spawned = Vec::with_capacity(count);

    for i in 0..count {
        let role = roles[i % roles.len()];
        let position = Position::new(rng.gen_range(0.0..=size), rng.gen_range(0.0..=size));
        let id = spawn_villager(world, role, position, generate_name(i, role));

        let known = world
            .get_resource::<EnvironmentHandle>()
            .map(|env| initial_knowledge(env, position));
        if let (Some(known), Some(entity)) = (known, crate::systems::turn::entity_of(world, id)) {
            if let Some(mut knowledge) = world.get_mut::<Knowledge>(entity) {
                *knowledge = known;
            }
        }
        tracing::trace!(
            agent = id.0,
            role = role.name(),
            x = position.x,
            y = position.y,
            "spawned"
        );
        spawned.push(id);
    }

    spawned
}

/// Get summary stats for spawned agents
pub fn get_spawn_summary(world: &mut World) -> SpawnSummary {
    let mut total_agents = 0;
    let mut by_role: BTreeMap<String, u32> = BTreeMap::new();
    let mut known_sites = 0;

    let mut query = world.query::<(&AgentId, &Role, &Knowledge)>();
    for (_id, role, knowledge) in query.iter(world) {
        total_agents += 1;
        *by_role.entry(role.name().to_string()).or_insert(0) += 1;
        known_sites += SiteKind::all().iter().map(|k| knowledge.count(*k)).sum::<usize>();
    }

    SpawnSummary {
        total_agents,
        by_role,
        known_sites,
    }
}

/// Summary of spawned agents
#[derive(Debug)]
pub struct SpawnSummary {
    pub total_agents: u32,
    pub by_role: BTreeMap<String, u32>,
    /// Sum over agents of the sites each one starts out knowing
    pub known_sites: usize,
}

impl fmt::Display for SpawnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Spawn Summary:")?;
        writeln!(f, "  Total agents: {}", self.total_agents)?;
        writeln!(f, "  Known sites (all agents): {}", self.known_sites)?;
        writeln!(f, "  By role:")?;
        for (role, count) in &self.by_role {
            writeln!(f, "    {}: {}", role, count)?;
        }
        Ok(())
    }
}

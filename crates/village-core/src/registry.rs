//! Agent Registry
//!
//! Central id -> entity map. Every cross-agent reference in the simulation is
//! an `AgentId`; this is where those ids are resolved and checked for
//! liveness.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;

use crate::components::{AgentId, Alive};

/// Resource: maps agent ids to their entities, in id order
#[derive(Resource, Debug, Default)]
pub struct Roster {
    entities: BTreeMap<AgentId, Entity>,
    next_id: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next unused agent id
    pub fn allocate_id(&mut self) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn register(&mut self, id: AgentId, entity: Entity) {
        self.next_id = self.next_id.max(id.0 + 1);
        self.entities.insert(id, entity);
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: AgentId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    /// All registered ids in ascending order
    pub fn ids(&self) -> Vec<AgentId> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, Entity)> + '_ {
        self.entities.iter().map(|(id, e)| (*id, *e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered and not yet marked dead
    pub fn is_alive(&self, world: &World, id: AgentId) -> bool {
        self.entity(id)
            .and_then(|e| world.get::<Alive>(e))
            .is_some_and(|alive| alive.is_alive())
    }
}

/// Spawn-time helper: allocate an id, spawn the bundle with it and register it
pub fn spawn_agent(world: &mut World, bundle: impl Bundle) -> AgentId {
    let id = world.resource_mut::<Roster>().allocate_id();
    let entity = world.spawn((id, Alive::new())).insert(bundle).id();
    world.resource_mut::<Roster>().register(id, entity);
    id
}

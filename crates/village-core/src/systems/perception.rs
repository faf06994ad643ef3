//! Perception System
//!
//! Read-only pass over positions. Builds a proximity index of living agents
//! once per tick, then fills each agent's `Nearby` list. `Population` is
//! the per-turn snapshot the decision subsystems read other agents from.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;

use super::exploration::Exploration;
use crate::components::{
    AgentId, Alive, Health, HuntRecord, Knowledge, Physiology, Position, Role, SiteKind,
    TerritoryLink, Traits,
};
use crate::components::{HuntGroupId, TerritoryId};
use crate::config::SimConfig;
use crate::movement::distance;

/// Component: living agents within perception radius, nearest first
#[derive(Component, Debug, Clone, Default)]
pub struct Nearby {
    pub agents: Vec<(AgentId, f32)>,
}

impl Nearby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_see(&self, id: AgentId) -> bool {
        self.agents.iter().any(|(other, _)| *other == id)
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }

    pub fn is_alone(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Resource: positions of living agents, in id order
#[derive(Resource, Debug, Default)]
pub struct ProximityIndex {
    entries: Vec<(AgentId, Position)>,
}

impl ProximityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn add(&mut self, id: AgentId, position: Position) {
        self.entries.push((id, position));
    }

    /// Agents within `radius` of `position`, excluding `exclude`, nearest first
    pub fn within(&self, position: Position, radius: f32, exclude: AgentId) -> Vec<(AgentId, f32)> {
        let mut found: Vec<(AgentId, f32)> = self
            .entries
            .iter()
            .filter(|(id, _)| *id != exclude)
            .map(|(id, p)| (*id, distance(position, *p)))
            .filter(|(_, d)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// System to build the proximity index
pub fn build_proximity_index(
    mut index: ResMut<ProximityIndex>,
    query: Query<(&AgentId, &Position, &Alive)>,
) {
    index.clear();
    let mut living: Vec<(AgentId, Position)> = query
        .iter()
        .filter(|(_, _, alive)| alive.is_alive())
        .map(|(id, pos, _)| (*id, *pos))
        .collect();
    living.sort_by_key(|(id, _)| *id);
    for (id, pos) in living {
        index.add(id, pos);
    }
}

/// System to refresh every agent's `Nearby` from the index
pub fn update_perception(
    index: Res<ProximityIndex>,
    config: Res<SimConfig>,
    mut query: Query<(&AgentId, &Position, &mut Nearby)>,
) {
    let radius = config.simulation.perception_radius;
    for (id, position, mut nearby) in query.iter_mut() {
        nearby.agents = index.within(*position, radius, *id);
    }
}

/// What one agent looks like to the others during a turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    pub id: AgentId,
    pub position: Position,
    pub alive: bool,
    pub role: Option<Role>,
    pub traits: Traits,
    pub hunger: f32,
    pub thirst: f32,
    pub fatigue: f32,
    pub territory: Option<TerritoryId>,
    pub hunt_group: Option<HuntGroupId>,
    pub exploring: bool,
    pub injured: bool,
    pub critical: bool,
    pub caregiver: Option<AgentId>,
    pub known_caves: usize,
    pub known_berries: usize,
    pub known_hunting: usize,
}

impl AgentView {
    /// A living agent at `position` with default state
    pub fn new(id: AgentId, position: Position) -> Self {
        Self {
            id,
            position,
            alive: true,
            role: None,
            traits: Traits::default(),
            hunger: 0.0,
            thirst: 0.0,
            fatigue: 0.0,
            territory: None,
            hunt_group: None,
            exploring: false,
            injured: false,
            critical: false,
            caregiver: None,
            known_caves: 0,
            known_berries: 0,
            known_hunting: 0,
        }
    }

    /// Knows strictly less than `other` about caves, berries or hunting grounds
    pub fn needs_info_from(&self, other: &AgentView) -> bool {
        self.known_caves < other.known_caves
            || self.known_berries < other.known_berries
            || self.known_hunting < other.known_hunting
    }
}

/// Snapshot of every registered agent, rebuilt at the start of each turn
#[derive(Debug, Clone, Default)]
pub struct Population {
    agents: BTreeMap<AgentId, AgentView>,
}

type ViewQuery<'a> = (
    &'a AgentId,
    &'a Position,
    &'a Alive,
    Option<&'a Role>,
    Option<&'a Traits>,
    Option<&'a Physiology>,
    Option<&'a TerritoryLink>,
    Option<&'a HuntRecord>,
    Option<&'a Exploration>,
    Option<&'a Health>,
    Option<&'a Knowledge>,
);

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_views(views: impl IntoIterator<Item = AgentView>) -> Self {
        Self {
            agents: views.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    pub fn capture(world: &mut World) -> Self {
        let mut query = world.query::<ViewQuery<'_>>();
        let views = query.iter(world).map(
            |(
                id,
                pos,
                alive,
                role,
                traits,
                body,
                territory,
                hunt,
                exploration,
                health,
                knowledge,
            )| {
                let body = body.cloned().unwrap_or_default();
                AgentView {
                    id: *id,
                    position: *pos,
                    alive: alive.is_alive(),
                    role: role.copied(),
                    traits: traits.cloned().unwrap_or_default(),
                    hunger: body.hunger,
                    thirst: body.thirst,
                    fatigue: body.fatigue,
                    territory: territory.and_then(|t| t.0),
                    hunt_group: hunt.and_then(|h| h.group),
                    exploring: exploration.is_some_and(|e| e.is_exploring()),
                    injured: health.is_some_and(|h| h.is_injured()),
                    critical: health.is_some_and(|h| h.is_critical()),
                    caregiver: health.and_then(|h| h.injury.as_ref()).and_then(|i| i.caregiver),
                    known_caves: knowledge.map_or(0, |k| k.count(SiteKind::Cave)),
                    known_berries: knowledge.map_or(0, |k| k.count(SiteKind::Berries)),
                    known_hunting: knowledge.map_or(0, |k| k.count(SiteKind::HuntingGround)),
                }
            },
        );
        Self::from_views(views.collect::<Vec<_>>())
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentView> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentView> {
        self.agents.get_mut(&id)
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.agents.get(&id).is_some_and(|v| v.alive)
    }

    /// Living agents in id order
    pub fn living(&self) -> impl Iterator<Item = &AgentView> {
        self.agents.values().filter(|v| v.alive)
    }

    /// Other living agents within `radius` of `position`, in id order
    pub fn living_within(
        &self,
        position: Position,
        radius: f32,
        exclude: AgentId,
    ) -> impl Iterator<Item = &AgentView> {
        self.living()
            .filter(move |v| v.id != exclude && distance(position, v.position) < radius)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

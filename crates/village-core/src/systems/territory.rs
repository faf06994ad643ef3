//! Territory
//!
//! Agents that keep resting at the same cave come to feel safe there and
//! claim it. Claims that overlap an existing territory either merge into
//! that community (trusted owner) or go through the owner's boundary check.

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use village_events::{NeedCategory, SimEventKind, TerritorySnapshot};

use super::boundary::{ExperienceKind, ExperienceTarget, InteractionKind};
use super::coherence::CoherenceLedger;
use super::perception::Population;
use super::turn::{check_interaction, entity_of, experience, TurnContext};
use crate::components::{AgentId, GridCell, Knowledge, Position, TerritoryId, TerritoryLink};
use crate::config::TerritoryConfig;
use crate::movement::distance;

/// Constants for the territory coherence factor
pub mod territory_constants {
    /// Factor for agents without a territory
    pub const NO_TERRITORY: f32 = 0.5;
    pub const INSIDE_GAIN: f32 = 0.5;
    pub const INSIDE_MAX: f32 = 1.5;
    pub const OUTSIDE_LOSS: f32 = 0.3;
    pub const OUTSIDE_MIN: f32 = 0.3;
}

/// A claimed area around a cave
#[derive(Debug, Clone, PartialEq)]
pub struct Territory {
    pub id: TerritoryId,
    pub owner: AgentId,
    pub center: GridCell,
    pub radius: f32,
    pub members: BTreeSet<AgentId>,
    pub claimed_at: u64,
}

impl Territory {
    pub fn contains(&self, position: Position) -> bool {
        distance(self.center.to_position(), position) <= self.radius
    }

    /// Above 1 inside the radius (peaking at the center), below 1 outside
    pub fn coherence_factor(&self, position: Position) -> f32 {
        use territory_constants::*;

        let r = self.radius.max(f32::EPSILON);
        let d = distance(self.center.to_position(), position);
        if d <= r {
            (1.0 + (r - d) / r * INSIDE_GAIN).min(INSIDE_MAX)
        } else {
            (1.0 - (d - r) / r * OUTSIDE_LOSS).max(OUTSIDE_MIN)
        }
    }
}

/// Resource: every claimed territory
#[derive(Resource, Debug, Clone, Default)]
pub struct TerritoryRegistry {
    territories: BTreeMap<TerritoryId, Territory>,
    next_id: u32,
    config: TerritoryConfig,
}

impl TerritoryRegistry {
    pub fn new(config: TerritoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TerritoryConfig {
        &self.config
    }

    pub fn get(&self, id: TerritoryId) -> Option<&Territory> {
        self.territories.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    pub fn claim(
        &mut self,
        owner: AgentId,
        center: GridCell,
        radius: f32,
        tick: u64,
    ) -> TerritoryId {
        let id = TerritoryId(self.next_id);
        self.next_id += 1;
        self.territories.insert(
            id,
            Territory {
                id,
                owner,
                center,
                radius,
                members: BTreeSet::from([owner]),
                claimed_at: tick,
            },
        );
        id
    }

    pub fn join(&mut self, id: TerritoryId, agent: AgentId) -> bool {
        match self.territories.get_mut(&id) {
            Some(territory) => territory.members.insert(agent),
            None => false,
        }
    }

    /// Remove an agent from whatever territory it belongs to. The lowest
    /// remaining member inherits ownership; an empty territory disappears.
    pub fn leave(&mut self, agent: AgentId) -> Option<TerritoryId> {
        let id = self
            .territories
            .values()
            .find(|t| t.members.contains(&agent))
            .map(|t| t.id)?;
        let territory = self.territories.get_mut(&id)?;
        territory.members.remove(&agent);
        match territory.members.first().copied() {
            None => {
                self.territories.remove(&id);
            }
            Some(heir) if territory.owner == agent => territory.owner = heir,
            Some(_) => {}
        }
        Some(id)
    }

    /// First territory (by id) whose area overlaps a circle at `center`
    pub fn overlapping(&self, center: GridCell, radius: f32) -> Option<TerritoryId> {
        self.territories
            .values()
            .find(|t| {
                distance(t.center.to_position(), center.to_position())
                    < t.radius + radius - self.config.overlap_buffer
            })
            .map(|t| t.id)
    }

    pub fn coherence_factor(&self, territory: Option<TerritoryId>, position: Position) -> f32 {
        territory
            .and_then(|id| self.get(id))
            .map_or(territory_constants::NO_TERRITORY, |t| t.coherence_factor(position))
    }

    pub fn snapshot(
        &self,
        territory: Option<TerritoryId>,
        position: Position,
    ) -> TerritorySnapshot {
        let found = territory.and_then(|id| self.get(id));
        TerritorySnapshot {
            territory: found.map(|t| t.id.0),
            coherence_factor: self.coherence_factor(territory, position),
            inside: found.is_some_and(|t| t.contains(position)),
            members: found.map_or(0, |t| t.members.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }
}

/// How safe an agent feels at a cave, from the rests it took there
pub fn safety_feeling(rests: u32, config: &TerritoryConfig) -> f32 {
    (rests as f32 / config.rests_for_safety.max(1) as f32).min(1.0)
}

fn set_link(world: &mut World, agent: AgentId, territory: Option<TerritoryId>) {
    let entity = entity_of(world, agent);
    if let Some(mut link) = entity.and_then(|e| world.get_mut::<TerritoryLink>(e)) {
        link.0 = territory;
    }
}

fn record_territory_outcome(world: &mut World, agent: AgentId, success: bool) {
    let entity = entity_of(world, agent);
    if let Some(mut ledger) = entity.and_then(|e| world.get_mut::<CoherenceLedger>(e)) {
        ledger.record_outcome(NeedCategory::Territory, success);
    }
}

/// Add an agent to an existing territory and fold it into its boundary
fn admit(world: &mut World, ctx: &mut TurnContext, agent: AgentId, id: TerritoryId) -> bool {
    if !ctx.territories.join(id, agent) {
        return false;
    }
    let Some(territory) = ctx.territories.get(id).cloned() else {
        return false;
    };
    set_link(world, agent, Some(id));
    let members: Vec<AgentId> = territory.members.iter().copied().collect();
    ctx.boundaries.integrate_territory(agent, territory.center, &members);
    let trust = ctx.trust.get_trust(agent, territory.owner);
    ctx.boundaries.sync_trust(agent, territory.owner, trust);
    record_territory_outcome(world, agent, true);

    tracing::info!(
        agent = agent.0,
        territory = id.0,
        owner = territory.owner.0,
        "territory joined"
    );
    ctx.events.push(
        ctx.tick,
        SimEventKind::TerritoryJoined {
            agent: agent.0,
            territory: id.0,
        },
    );
    true
}

/// Try to claim the cave `agent` just rested at. Returns the territory the
/// agent ended up in, if any.
pub fn try_claim(
    world: &mut World,
    ctx: &mut TurnContext,
    agent: AgentId,
    cave: GridCell,
    population: &Population,
) -> Option<TerritoryId> {
    let view = population.get(agent)?;
    if view.territory.is_some() {
        return None;
    }
    let config = ctx.territories.config().clone();
    let rests = entity_of(world, agent)
        .and_then(|e| world.get::<Knowledge>(e))
        .map_or(0, |k| k.rests_at(cave));
    let safety = safety_feeling(rests, &config);
    if safety < config.claim_threshold {
        return None;
    }
    let radius = config.base_radius + config.base_radius * safety;

    if let Some(existing) = ctx.territories.overlapping(cave, radius) {
        let territory = ctx.territories.get(existing)?.clone();
        if ctx.trust.get_trust(agent, territory.owner) > config.merge_trust {
            return admit(world, ctx, agent, existing).then_some(existing);
        }
        let result = check_interaction(
            world,
            ctx,
            agent,
            &ExperienceTarget::Location(territory.center),
            InteractionKind::TerritoryEnter,
            population,
        );
        if !result.allowed {
            record_territory_outcome(world, agent, false);
            return None;
        }
    }

    let id = ctx.territories.claim(agent, cave, radius, ctx.tick);
    set_link(world, agent, Some(id));
    ctx.boundaries.integrate_territory(agent, cave, &[agent]);
    record_territory_outcome(world, agent, true);

    tracing::info!(agent = agent.0, territory = id.0, radius, "territory claimed");
    ctx.events.push(
        ctx.tick,
        SimEventKind::TerritoryClaimed {
            agent: agent.0,
            territory: id.0,
            center: (cave.x, cave.y),
            radius,
        },
    );
    Some(id)
}

/// Work on the agent's territory: a community-building experience, then
/// invite trusting neighbours without a territory of their own. Returns how
/// many joined.
pub fn strengthen(
    world: &mut World,
    ctx: &mut TurnContext,
    agent: AgentId,
    population: &Population,
) -> usize {
    let Some(territory) = population
        .get(agent)
        .and_then(|v| v.territory)
        .and_then(|id| ctx.territories.get(id))
        .cloned()
    else {
        return 0;
    };

    experience(
        world,
        ctx,
        agent,
        ExperienceKind::CommunityBuilding,
        &ExperienceTarget::Location(territory.center),
        population,
    );
    record_territory_outcome(world, agent, true);

    let invite_trust = ctx.territories.config().invite_trust;
    let invitees: Vec<AgentId> = population
        .living_within(territory.center.to_position(), territory.radius, agent)
        .filter(|v| v.territory.is_none())
        .filter(|v| ctx.trust.get_trust(v.id, agent) > invite_trust)
        .map(|v| v.id)
        .collect();
    invitees
        .into_iter()
        .filter(|invitee| admit(world, ctx, *invitee, territory.id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Role;
    use crate::config::SimConfig;
    use crate::systems::boundary::BoundaryObject;
    use crate::systems::testing::{spawn_test_agent, test_world};
    use crate::systems::trust::{HeatState, TrustContext, TrustEventKind};

    fn rest_times(world: &mut World, agent: AgentId, cave: GridCell, times: u32) {
        let entity = entity_of(world, agent).unwrap();
        let mut knowledge = world.get_mut::<Knowledge>(entity).unwrap();
        for _ in 0..times {
            knowledge.record_rest(cave);
        }
    }

    #[test]
    fn test_coherence_factor_shape() {
        let mut registry = TerritoryRegistry::new(TerritoryConfig::default());
        let id = registry.claim(AgentId(0), GridCell::new(10, 10), 10.0, 0);

        let center = registry.coherence_factor(Some(id), Position::new(10.0, 10.0));
        let edge = registry.coherence_factor(Some(id), Position::new(20.0, 10.0));
        let far = registry.coherence_factor(Some(id), Position::new(90.0, 10.0));
        assert!((center - 1.5).abs() < 1e-6);
        assert!((edge - 1.0).abs() < 1e-6);
        assert!((far - 0.3).abs() < 1e-6);
        assert_eq!(registry.coherence_factor(None, Position::default()), 0.5);
    }

    #[test]
    fn test_leave_passes_ownership() {
        let mut registry = TerritoryRegistry::default();
        let id = registry.claim(AgentId(3), GridCell::new(0, 0), 8.0, 0);
        registry.join(id, AgentId(7));
        registry.join(id, AgentId(5));

        assert_eq!(registry.leave(AgentId(3)), Some(id));
        assert_eq!(registry.get(id).unwrap().owner, AgentId(5));
        registry.leave(AgentId(5));
        registry.leave(AgentId(7));
        assert!(registry.is_empty());
        assert_eq!(registry.leave(AgentId(7)), None);
    }

    #[test]
    fn test_safety_feeling() {
        let config = TerritoryConfig::default();
        assert!((safety_feeling(1, &config) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(safety_feeling(5, &config), 1.0);
    }

    #[test]
    fn test_claim_after_enough_rests() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 2);
        let agent = spawn_test_agent(&mut world, Role::Guardian, Position::new(20.0, 20.0));
        let cave = GridCell::new(20, 20);

        rest_times(&mut world, agent, cave, 1);
        let population = Population::capture(&mut world);
        assert!(try_claim(&mut world, &mut ctx, agent, cave, &population).is_none());

        rest_times(&mut world, agent, cave, 1);
        let population = Population::capture(&mut world);
        let id = try_claim(&mut world, &mut ctx, agent, cave, &population).unwrap();

        let territory = ctx.territories.get(id).unwrap();
        // two rests: safety 2/3, radius 8 + 8 × 2/3
        assert!((territory.radius - (8.0 + 16.0 / 3.0)).abs() < 1e-4);
        let entity = entity_of(&world, agent).unwrap();
        assert_eq!(world.get::<TerritoryLink>(entity).unwrap().0, Some(id));
        assert!(ctx.boundaries.is_within(agent, &BoundaryObject::Place(cave)));
        assert_eq!(ctx.events.of_type("territory_claimed").count(), 1);
    }

    #[test]
    fn test_trusted_owner_merges() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 2);
        let owner = spawn_test_agent(&mut world, Role::Leader, Position::new(20.0, 20.0));
        let settler = spawn_test_agent(&mut world, Role::Forager, Position::new(24.0, 20.0));
        let existing = ctx.territories.claim(owner, GridCell::new(20, 20), 12.0, 0);

        let state = HeatState::default();
        ctx.trust.record_event(
            settler,
            owner,
            TrustEventKind::LifeSavedCritical,
            &state,
            TrustContext::life_threatening(),
            0,
        );
        assert!(ctx.trust.get_trust(settler, owner) > 0.6);

        let cave = GridCell::new(24, 20);
        rest_times(&mut world, settler, cave, 3);
        let population = Population::capture(&mut world);
        assert_eq!(try_claim(&mut world, &mut ctx, settler, cave, &population), Some(existing));
        assert_eq!(ctx.territories.len(), 1);
        assert!(ctx.territories.get(existing).unwrap().members.contains(&settler));
        assert_eq!(ctx.events.of_type("territory_joined").count(), 1);
    }

    #[test]
    fn test_guarded_overlap_is_refused() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 2);
        let owner = spawn_test_agent(&mut world, Role::Guardian, Position::new(20.0, 20.0));
        let stranger = spawn_test_agent(&mut world, Role::Nomad, Position::new(26.0, 20.0));
        let center = GridCell::new(20, 20);
        ctx.territories.claim(owner, center, 12.0, 0);
        ctx.boundaries.integrate_territory(owner, center, &[owner]);
        ctx.boundaries
            .set_strength(owner, BoundaryObject::Place(center), 0.9);

        let cave = GridCell::new(26, 20);
        rest_times(&mut world, stranger, cave, 3);
        let population = Population::capture(&mut world);
        assert!(try_claim(&mut world, &mut ctx, stranger, cave, &population).is_none());
        assert_eq!(ctx.territories.len(), 1);
        assert_eq!(ctx.events.of_type("boundary_violation").count(), 1);
    }

    #[test]
    fn test_strengthen_invites_trusting_neighbours() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 2);
        let owner = spawn_test_agent(&mut world, Role::Diplomat, Position::new(30.0, 30.0));
        let friend = spawn_test_agent(&mut world, Role::Healer, Position::new(33.0, 30.0));
        let stranger = spawn_test_agent(&mut world, Role::Loner, Position::new(31.0, 30.0));
        let id = ctx.territories.claim(owner, GridCell::new(30, 30), 10.0, 0);
        let entity = entity_of(&world, owner).unwrap();
        world.get_mut::<TerritoryLink>(entity).unwrap().0 = Some(id);

        ctx.trust.record_event(
            friend,
            owner,
            TrustEventKind::LifeSavedCritical,
            &HeatState::default(),
            TrustContext::life_threatening(),
            0,
        );
        let population = Population::capture(&mut world);
        assert_eq!(strengthen(&mut world, &mut ctx, owner, &population), 1);
        let members = &ctx.territories.get(id).unwrap().members;
        assert!(members.contains(&friend));
        assert!(!members.contains(&stranger));
    }
}

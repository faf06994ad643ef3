//! Physiology System
//!
//! Clock advance, per-tick need drift, death, and the deferred end-of-tick
//! removal of dead agents.

use bevy_ecs::prelude::*;
use village_events::{DeathCause, SimEventKind};

use super::boundary::BoundaryEngine;
use super::hunting::{clear_hunt_refs, HuntCoordinator, MeatStore};
use super::territory::TerritoryRegistry;
use super::trust::TrustLedger;
use crate::components::{AgentId, Alive, Physiology, Position, SimClock, TerritoryLink};
use crate::config::{PhysiologyConfig, SimConfig};
use crate::environment::EnvironmentHandle;
use crate::events::TickEvents;
use crate::registry::Roster;

/// Temperature stress scales every drift rate by (1 + stress × this)
pub const STRESS_SCALE: f32 = 2.0;

/// System: advance the simulation clock
pub fn update_clock(mut clock: ResMut<SimClock>) {
    clock.advance_tick();
}

/// Which threshold, if any, this body has crossed
pub fn death_cause(body: &Physiology, config: &PhysiologyConfig) -> Option<DeathCause> {
    if body.thirst > config.thirst_death {
        Some(DeathCause::Dehydration)
    } else if body.hunger > config.hunger_death {
        Some(DeathCause::Starvation)
    } else {
        None
    }
}

/// System: needs drift upward each tick; crossing a death threshold marks
/// the agent dead
pub fn apply_physiological_drift(
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    environment: Option<Res<EnvironmentHandle>>,
    mut events: ResMut<TickEvents>,
    mut query: Query<(&AgentId, &Position, &mut Physiology, &mut Alive)>,
) {
    let tick = clock.current_tick;
    let rates = &config.physiology;
    for (id, position, mut body, mut alive) in query.iter_mut() {
        if !alive.is_alive() {
            continue;
        }
        let stress = environment
            .as_ref()
            .map_or(0.0, |env| env.0.feedback(*position, tick).seasonal.temperature_stress);
        let scale = 1.0 + stress * STRESS_SCALE;
        body.add_hunger(rates.hunger_rate * scale);
        body.add_thirst(rates.thirst_rate * scale);
        body.add_fatigue(rates.fatigue_rate * scale);

        if let Some(cause) = death_cause(&body, rates) {
            alive.kill();
            tracing::info!(agent = id.0, ?cause, tick, "agent died");
            events.push(tick, SimEventKind::Death { agent: id.0, cause });
        }
    }
}

/// System: despawn dead agents and drop every reference to them.
///
/// Runs after all turns so no in-progress iteration is invalidated.
pub fn reap_dead(world: &mut World) {
    let mut query = world.query::<(Entity, &AgentId, &Alive)>();
    let dead: Vec<(Entity, AgentId)> = query
        .iter(world)
        .filter(|(_, _, alive)| !alive.is_alive())
        .map(|(entity, id, _)| (entity, *id))
        .collect();

    for (entity, id) in dead {
        world.despawn(entity);
        if let Some(mut roster) = world.get_resource_mut::<Roster>() {
            roster.remove(id);
        }

        let abandoned = world
            .get_resource_mut::<HuntCoordinator>()
            .map(|mut hunts| {
                let groups = hunts.disband_led_by(id);
                hunts.remove_member(id);
                groups
            })
            .unwrap_or_default();
        for group in &abandoned {
            clear_hunt_refs(world, group);
            tracing::debug!(group = group.id.0, leader = id.0, "hunt group disbanded");
        }

        let left = world
            .get_resource_mut::<TerritoryRegistry>()
            .and_then(|mut territories| territories.leave(id));
        if let Some(territory) = left {
            tracing::debug!(agent = id.0, territory = territory.0, "dead member left territory");
        }
        if let Some(mut boundaries) = world.get_resource_mut::<BoundaryEngine>() {
            boundaries.forget(id);
        }
        if let Some(mut trust) = world.get_resource_mut::<TrustLedger>() {
            trust.forget(id);
        }
        if let Some(mut meat) = world.get_resource_mut::<MeatStore>() {
            meat.forget_owner(id);
        }
    }

    // links to territories that vanished with their last member
    let live: Vec<_> = world
        .get_resource::<TerritoryRegistry>()
        .map(|t| t.iter().map(|t| t.id).collect())
        .unwrap_or_default();
    let mut links = world.query::<&mut TerritoryLink>();
    for mut link in links.iter_mut(world) {
        if link.0.is_some_and(|t| !live.contains(&t)) {
            link.0 = None;
        }
    }
}

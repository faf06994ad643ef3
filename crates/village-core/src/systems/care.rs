//! Injury & Care
//!
//! Critically injured agents are tended by neighbours who decide to help.
//! Recovery runs once per tick in `advance_recovery`; a caregiver in reach
//! speeds it up. Caregivers are referenced by id and dropped as soon as they
//! are no longer alive.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use village_events::SimEventKind;

use super::boundary::{BoundaryEngine, ExperienceKind, ExperienceTarget};
use super::perception::Population;
use super::trust::{HeatState, TrustContext, TrustEventKind, TrustLedger};
use super::turn::{entity_of, experience, record_trust, TurnContext};
use crate::components::{AgentId, Alive, Health, Physiology, Position, SimClock};
use crate::config::SimConfig;
use crate::events::TickEvents;
use crate::movement::{clamp_to_map, distance, move_towards};

/// Willingness weights
pub mod care_constants {
    pub const EMPATHY_WEIGHT: f32 = 0.6;
    pub const TRUST_WEIGHT: f32 = 0.4;
    pub const BASE_WILLINGNESS: f32 = 0.1;
}

/// empathy × 0.6 + trust × 0.4 + 0.1, within [0, 1]
pub fn care_willingness(empathy: f32, trust_in_patient: f32) -> f32 {
    use care_constants::*;

    (empathy * EMPATHY_WEIGHT + trust_in_patient * TRUST_WEIGHT + BASE_WILLINGNESS).clamp(0.0, 1.0)
}

/// Nearest critically injured neighbour within `radius` that has no living
/// caregiver (or is already tended by `caregiver`)
pub fn find_patient(population: &Population, caregiver: AgentId, radius: f32) -> Option<AgentId> {
    let me = population.get(caregiver)?;
    population
        .living_within(me.position, radius, caregiver)
        .filter(|p| p.critical)
        .filter(|p| match p.caregiver {
            None => true,
            Some(current) => current == caregiver || !population.is_alive(current),
        })
        .min_by(|a, b| {
            distance(me.position, a.position)
                .total_cmp(&distance(me.position, b.position))
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|p| p.id)
}

/// Walk to the patient and tend them once in reach. Returns true if care
/// was given this turn.
pub fn offer_care(
    world: &mut World,
    ctx: &mut TurnContext,
    caregiver: AgentId,
    patient: AgentId,
    population: &Population,
) -> bool {
    let (Some(me), Some(them)) = (population.get(caregiver), population.get(patient)) else {
        return false;
    };
    if !them.alive || !them.critical {
        return false;
    }
    let (Some(carer_entity), Some(patient_entity)) =
        (entity_of(world, caregiver), entity_of(world, patient))
    else {
        return false;
    };

    let speed = ctx.config.physiology.move_speed;
    let size = ctx.environment.0.world_size();
    let position = clamp_to_map(move_towards(me.position, them.position, speed), size);
    if let Some(mut pos) = world.get_mut::<Position>(carer_entity) {
        *pos = position;
    }
    if distance(position, them.position) > ctx.config.care.care_radius {
        return false;
    }

    let newly_assigned = {
        let Some(mut health) = world.get_mut::<Health>(patient_entity) else {
            return false;
        };
        let Some(injury) = health.injury.as_mut() else {
            return false;
        };
        let fresh = injury.caregiver != Some(caregiver);
        injury.caregiver = Some(caregiver);
        fresh
    };

    if newly_assigned {
        tracing::info!(caregiver = caregiver.0, patient = patient.0, "care started");
        ctx.events.push(
            ctx.tick,
            SimEventKind::CareStarted {
                caregiver: caregiver.0,
                patient: patient.0,
            },
        );
    }
    record_trust(
        world,
        ctx,
        patient,
        caregiver,
        TrustEventKind::CareDuringInjury,
        TrustContext::life_threatening(),
    );
    experience(
        world,
        ctx,
        caregiver,
        ExperienceKind::SocialCooperation,
        &ExperienceTarget::Agent(patient),
        population,
    );
    true
}

/// System: count down injuries, faster with a caregiver in reach.
///
/// Recovering from a critical injury with a caregiver still alive settles
/// `life_saved_critical` trust and a care bond.
pub fn advance_recovery(
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    mut trust: ResMut<TrustLedger>,
    mut boundaries: ResMut<BoundaryEngine>,
    mut events: ResMut<TickEvents>,
    mut query: Query<(&AgentId, &Position, &Alive, &mut Health, Option<&Physiology>)>,
) {
    let tick = clock.current_tick;
    let living: BTreeMap<AgentId, Position> = query
        .iter()
        .filter(|(_, _, alive, _, _)| alive.is_alive())
        .map(|(id, pos, _, _, _)| (*id, *pos))
        .collect();

    for (id, position, alive, mut health, body) in query.iter_mut() {
        if !alive.is_alive() {
            continue;
        }
        let Some(injury) = health.injury.as_mut() else {
            continue;
        };

        if let Some(carer) = injury.caregiver {
            if !living.contains_key(&carer) {
                tracing::debug!(patient = id.0, caregiver = carer.0, "stale caregiver cleared");
                injury.caregiver = None;
            }
        }
        let tended = injury
            .caregiver
            .and_then(|carer| living.get(&carer))
            .is_some_and(|at| distance(*at, *position) <= config.care.care_radius);
        injury.remaining -= 1.0;
        if tended {
            injury.remaining -= config.care.effectiveness;
        }
        if injury.remaining > 0.0 {
            continue;
        }

        let critical = injury.critical;
        let caregiver = injury.caregiver;
        health.injury = None;
        if !critical {
            continue;
        }

        if let Some(carer) = caregiver {
            let state = HeatState::of(
                &body.cloned().unwrap_or_default(),
                Some(&*health),
                tick,
                trust.config(),
            );
            trust.record_event(
                *id,
                carer,
                TrustEventKind::LifeSavedCritical,
                &state,
                TrustContext::life_threatening(),
                tick,
            );
            boundaries.integrate_care(carer, *id);
        }
        tracing::info!(agent = id.0, caregiver = caregiver.map(|c| c.0), "recovered");
        events.push(
            tick,
            SimEventKind::Recovered {
                agent: id.0,
                caregiver: caregiver.map(|c| c.0),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Injury, Role};
    use crate::systems::boundary::BoundaryObject;
    use crate::systems::testing::{spawn_test_agent, test_world};
    use crate::systems::trust::trust_ledger_from;

    fn recovery_world() -> World {
        let config = SimConfig::default();
        let mut world = World::new();
        world.insert_resource(SimClock::new(config.simulation.season_length));
        world.insert_resource(trust_ledger_from(&config));
        world.insert_resource(BoundaryEngine::new(config.boundary.clone()));
        world.insert_resource(TickEvents::new());
        world.insert_resource(config);
        world
    }

    fn wounded(remaining: f32, caregiver: Option<AgentId>) -> Health {
        Health {
            injury: Some(Injury {
                critical: true,
                remaining,
                caregiver,
            }),
            last_injured_at: Some(0),
        }
    }

    #[test]
    fn test_willingness() {
        assert!((care_willingness(0.5, 0.5) - 0.6).abs() < 1e-6);
        assert_eq!(care_willingness(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_care_speeds_recovery() {
        let mut world = recovery_world();
        world.spawn((
            AgentId(0),
            Position::new(10.0, 10.0),
            Alive::new(),
            wounded(10.0, Some(AgentId(1))),
        ));
        world.spawn((AgentId(1), Position::new(12.0, 10.0), Alive::new(), Health::default()));
        world.spawn((AgentId(2), Position::new(50.0, 50.0), Alive::new(), wounded(10.0, None)));

        let mut schedule = Schedule::default();
        schedule.add_systems(advance_recovery);
        schedule.run(&mut world);

        let mut query = world.query::<(&AgentId, &Health)>();
        for (id, health) in query.iter(&world) {
            match id.0 {
                0 => assert!((health.injury.as_ref().unwrap().remaining - 8.7).abs() < 1e-4),
                2 => assert!((health.injury.as_ref().unwrap().remaining - 9.0).abs() < 1e-4),
                _ => {}
            }
        }
    }

    #[test]
    fn test_dead_caregiver_is_cleared() {
        let mut world = recovery_world();
        let patient = world
            .spawn((
                AgentId(0),
                Position::new(10.0, 10.0),
                Alive::new(),
                wounded(10.0, Some(AgentId(1))),
            ))
            .id();
        world.spawn((AgentId(1), Position::new(11.0, 10.0), Alive(false), Health::default()));

        let mut schedule = Schedule::default();
        schedule.add_systems(advance_recovery);
        schedule.run(&mut world);

        let injury = world.get::<Health>(patient).unwrap().injury.clone().unwrap();
        assert_eq!(injury.caregiver, None);
        assert!((injury.remaining - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_recovery_with_caregiver_builds_trust_and_bond() {
        let mut world = recovery_world();
        let patient = world
            .spawn((
                AgentId(0),
                Position::new(10.0, 10.0),
                Alive::new(),
                wounded(1.0, Some(AgentId(1))),
            ))
            .id();
        world.spawn((AgentId(1), Position::new(11.0, 10.0), Alive::new(), Health::default()));

        let mut schedule = Schedule::default();
        schedule.add_systems(advance_recovery);
        schedule.run(&mut world);

        assert!(world.get::<Health>(patient).unwrap().injury.is_none());
        assert!(world.resource::<TrustLedger>().get_trust(AgentId(0), AgentId(1)) > 0.8);
        let bond = world
            .resource::<BoundaryEngine>()
            .strength(AgentId(0), &BoundaryObject::Person(AgentId(1)));
        assert!(bond >= 0.9 - 1e-6);
        assert_eq!(world.resource::<TickEvents>().of_type("recovered").count(), 1);
    }

    #[test]
    fn test_find_and_offer_care() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 1);
        let healer = spawn_test_agent(&mut world, Role::Healer, Position::new(10.0, 10.0));
        let patient = spawn_test_agent(&mut world, Role::Warrior, Position::new(14.0, 10.0));
        let entity = entity_of(&world, patient).unwrap();
        world.get_mut::<Health>(entity).unwrap().injure(0, true, 60.0);

        let population = Population::capture(&mut world);
        assert_eq!(find_patient(&population, healer, 15.0), Some(patient));
        assert!(offer_care(&mut world, &mut ctx, healer, patient, &population));

        let injury = world.get::<Health>(entity).unwrap().injury.clone().unwrap();
        assert_eq!(injury.caregiver, Some(healer));
        assert_eq!(ctx.events.of_type("care_started").count(), 1);
        assert!(ctx.trust.get_trust(patient, healer) > 0.5);

        // already tended by the healer: nobody else picks the patient
        let other = spawn_test_agent(&mut world, Role::Diplomat, Position::new(12.0, 10.0));
        let population = Population::capture(&mut world);
        assert_eq!(find_patient(&population, other, 15.0), None);
        assert_eq!(find_patient(&population, healer, 15.0), Some(patient));
    }
}

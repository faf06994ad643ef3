//! Scenario tests
//!
//! End-to-end situations driven through the public world API.

use bevy_ecs::prelude::*;
use std::fs;

use village_core::components::{AgentId, GridCell, Health, Physiology, Position, Role};
use village_core::config::HuntingConfig;
use village_core::events::{EventLogger, TickEvents};
use village_core::registry::Roster;
use village_core::setup::spawn_villager;
use village_core::systems::boundary::BoundaryObject;
use village_core::systems::hunting::{resolve_hunt, success_rate, PreyKind};
use village_core::systems::{
    BoundaryEngine, CoherenceLedger, Exploration, ExperienceTarget, InteractionKind, Population,
    TurnContext,
};
use village_core::{build_schedule, build_world, run_ticks, step, SimConfig};
use village_events::{ActionKind, DefenseResponse, ExplorationMode, ReversionCause, SimEventKind};

/// A world with every resource in place and nobody in it
fn empty_village() -> World {
    let mut config = SimConfig::default();
    config.simulation.agent_count = 0;
    build_world(config, 42)
}

fn entity(world: &World, id: AgentId) -> Entity {
    world.resource::<Roster>().entity(id).unwrap()
}

#[test]
fn test_strangers_meet_aggressive_defense() {
    let mut world = empty_village();
    let first = spawn_villager(&mut world, Role::Nomad, Position::new(10.0, 20.0), "First".into());
    let second = spawn_villager(
        &mut world,
        Role::Pioneer,
        Position::new(12.0, 20.0),
        "Second".into(),
    );
    let holder = spawn_villager(
        &mut world,
        Role::Guardian,
        Position::new(20.0, 20.0),
        "Holder".into(),
    );

    let cave = GridCell::new(20, 20);
    world
        .resource_mut::<BoundaryEngine>()
        .set_strength(holder, BoundaryObject::Place(cave), 0.9);
    let population = Population::capture(&mut world);

    for actor in [first, second] {
        let mut ledger = CoherenceLedger::new();
        let result = world.resource_mut::<BoundaryEngine>().check_interaction(
            actor,
            &ExperienceTarget::Location(cave),
            InteractionKind::TerritoryEnter,
            &population,
            &mut ledger,
            1,
        );
        assert!(!result.allowed);
        assert_eq!(result.defense(), Some(DefenseResponse::AggressiveDefense));
    }
    let engine = world.resource::<BoundaryEngine>();
    assert_eq!(engine.violations_at(&BoundaryObject::Place(cave)).len(), 2);
}

#[test]
fn test_life_crisis_ends_exploration_on_next_step() {
    let mut world = empty_village();
    let id = spawn_villager(
        &mut world,
        Role::Adventurer,
        Position::new(30.0, 30.0),
        "Scout".into(),
    );
    let e = entity(&world, id);
    world.get_mut::<Exploration>(e).unwrap().enter(0, 1.8);
    world.get_mut::<CoherenceLedger>(e).unwrap().add_energy(5.0, 5.0);
    world.get_mut::<Physiology>(e).unwrap().thirst = 190.0;

    let report = step(&mut world, id).unwrap();
    assert_eq!(report.exploration_state.mode, ExplorationMode::Settled);
    assert!(!world.get::<Exploration>(e).unwrap().is_exploring());

    let reverted = world.resource::<TickEvents>().iter().any(|event| {
        matches!(
            event.kind,
            SimEventKind::Reversion {
                cause: ReversionCause::LifeCrisis,
                ..
            }
        )
    });
    assert!(reverted);
}

#[test]
fn test_two_recruit_hunt_rate_and_frequency() {
    let config = HuntingConfig::default();
    assert!((success_rate(&config, 3, PreyKind::Medium) - 0.6).abs() < 1e-6);

    let mut world = empty_village();
    let mut hunter = |role, x, y, name: &str| {
        spawn_villager(&mut world, role, Position::new(x, y), name.to_string())
    };
    let leader = hunter(Role::Leader, 40.0, 40.0, "Lead");
    let first = hunter(Role::Warrior, 41.0, 40.0, "Spear");
    let second = hunter(Role::Tracker, 40.0, 41.0, "Trail");
    let population = Population::capture(&mut world);
    let mut ctx = TurnContext::take(&mut world).unwrap();

    let trials = 10_000;
    let mut successes = 0;
    for _ in 0..trials {
        let group = ctx.hunts.form(leader, PreyKind::Medium, 0);
        assert!(ctx.hunts.add_member(group, first));
        assert!(ctx.hunts.add_member(group, second));
        assert_eq!(ctx.hunts.begin(group), Some(PreyKind::Medium));
        let outcome = resolve_hunt(&mut world, &mut ctx, group, &population).unwrap();
        if outcome.success {
            successes += 1;
        }
    }
    ctx.restore(&mut world);

    let observed = successes as f32 / trials as f32;
    assert!((observed - 0.6).abs() < 0.02, "observed {}", observed);
}

#[test]
fn test_incapacitated_agent_only_rests() {
    let mut world = empty_village();
    let id = spawn_villager(&mut world, Role::Warrior, Position::new(50.0, 50.0), "Wounded".into());
    let e = entity(&world, id);
    world.get_mut::<Health>(e).unwrap().injure(0, true, 60.0);

    for _ in 0..3 {
        let report = step(&mut world, id).unwrap();
        assert_eq!(report.chosen_action, ActionKind::Rest);
    }
}

#[test]
fn test_dehydrated_agent_dies_and_is_reaped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut world = empty_village();
    let doomed = spawn_villager(&mut world, Role::Loner, Position::new(5.0, 5.0), "Doomed".into());
    let survivor = spawn_villager(
        &mut world,
        Role::Healer,
        Position::new(90.0, 90.0),
        "Survivor".into(),
    );
    let e = entity(&world, doomed);
    world.get_mut::<Physiology>(e).unwrap().thirst = 199.5;
    world.insert_resource(EventLogger::new(&path).unwrap());

    let mut schedule = build_schedule();
    run_ticks(&mut world, &mut schedule, 1);
    drop(world.remove_resource::<EventLogger>());

    let roster = world.resource::<Roster>();
    assert_eq!(roster.len(), 1);
    assert!(roster.entity(doomed).is_none());
    assert!(roster.entity(survivor).is_some());
    assert!(step(&mut world, doomed).is_none());

    let log = fs::read_to_string(&path).unwrap();
    let deaths: Vec<serde_json::Value> = log
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v["type"] == "death")
        .collect();
    assert_eq!(deaths.len(), 1);
    assert_eq!(deaths[0]["agent"], doomed.0);
    assert_eq!(deaths[0]["cause"], "dehydration");
    // dead agents take no turn
    let doomed_steps = log
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v["type"] == "step" && v["agent"] == doomed.0)
        .count();
    assert_eq!(doomed_steps, 0);
}

#[test]
fn test_village_survives_a_season() {
    let mut config = SimConfig::default();
    config.simulation.agent_count = 12;
    let mut world = build_world(config, 5);
    let mut schedule = build_schedule();
    run_ticks(&mut world, &mut schedule, 50);

    // nobody can die of hunger or thirst within the first 50 ticks
    assert_eq!(world.resource::<Roster>().len(), 12);
    let mut query = world.query::<&Physiology>();
    for body in query.iter(&world) {
        assert!(body.hunger >= 0.0 && body.thirst >= 0.0 && body.fatigue >= 0.0);
    }
}

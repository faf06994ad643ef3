//! Agent Turn
//!
//! `step` runs one agent's decision function to completion: environment
//! feedback, the coherence update, the exploration state machine, action
//! selection and execution. Shared subsystems live in a `TurnContext`
//! taken out of the world for the duration of the turns, so every write to
//! trust, boundaries and hunts goes through a single owner.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::f32::consts::TAU;
use village_events::{ActionKind, DefenseResponse, NeedCategory, Season, SimEventKind, StepReport};

use super::boundary::{
    BoundaryEngine, ExperienceKind, ExperienceOutcome, ExperienceTarget, InteractionKind,
    InteractionResponse, InteractionResult,
};
use super::care::{care_willingness, find_patient, offer_care};
use super::coherence::{Coherence, CoherenceLedger, NeedSamples};
use super::exploration::{Coverage, Exploration, ExplorationInputs, Transition};
use super::hunting::{
    abandon_hunt, organize_hunt, resolve_hunt, HuntCoordinator, HuntStatus, MeatStore,
};
use super::perception::{AgentView, Population};
use super::priority::{rank, HuntMotivation, MotivationInputs, SelectorState};
use super::territory::{strengthen, try_claim, TerritoryRegistry};
use super::trust::{trust_ledger_from, HeatState, TrustContext, TrustEventKind, TrustLedger};
use crate::components::{
    AgentId, GridCell, Health, HuntGroupId, HuntRecord, Knowledge, Physiology, Position, SimClock,
    Site, SiteKind,
};
use crate::config::SimConfig;
use crate::environment::EnvironmentHandle;
use crate::events::TickEvents;
use crate::movement::{clamp_to_map, distance, move_away, move_towards};
use crate::registry::Roster;
use crate::SimRng;

/// Constants for action execution
pub mod turn_constants {
    /// Caves further than this are not worth walking to for a rest
    pub const REST_CAVE_RANGE: f32 = 10.0;
    /// Hunt skill 0.3 (no history) leaves the hunt score unchanged
    pub const SKILL_BASE: f32 = 0.7;
    /// Allies trusted above this count when deciding to share knowledge
    pub const ALLY_TRUST: f32 = 0.5;
    pub const RELATIONSHIP_TRUST: f32 = 0.3;
}

/// Shared subsystems for a run of agent turns
pub struct TurnContext {
    pub tick: u64,
    pub season: Season,
    pub config: SimConfig,
    pub trust: TrustLedger,
    pub boundaries: BoundaryEngine,
    pub hunts: HuntCoordinator,
    pub meat: MeatStore,
    pub territories: TerritoryRegistry,
    pub rng: SimRng,
    pub events: TickEvents,
    pub environment: EnvironmentHandle,
    pub motivation: HuntMotivation,
}

impl TurnContext {
    /// Fresh subsystems built from config
    pub fn new(config: SimConfig, rng: SimRng, environment: EnvironmentHandle) -> Self {
        Self {
            tick: 0,
            season: Season::Spring,
            trust: trust_ledger_from(&config),
            boundaries: BoundaryEngine::new(config.boundary.clone()),
            hunts: HuntCoordinator::new(config.hunting.clone()),
            meat: MeatStore::new(&config.hunting),
            territories: TerritoryRegistry::new(config.territory.clone()),
            motivation: HuntMotivation::from(config.hunting.motivation),
            events: TickEvents::new(),
            rng,
            environment,
            config,
        }
    }

    /// Move the shared resources out of the world. `None` (and nothing
    /// removed) if any of them is missing.
    pub fn take(world: &mut World) -> Option<Self> {
        let ready = world.contains_resource::<SimConfig>()
            && world.contains_resource::<TrustLedger>()
            && world.contains_resource::<BoundaryEngine>()
            && world.contains_resource::<HuntCoordinator>()
            && world.contains_resource::<MeatStore>()
            && world.contains_resource::<TerritoryRegistry>()
            && world.contains_resource::<SimRng>()
            && world.contains_resource::<TickEvents>()
            && world.contains_resource::<EnvironmentHandle>()
            && world.contains_resource::<HuntMotivation>();
        if !ready {
            return None;
        }
        let (tick, season) = world
            .get_resource::<SimClock>()
            .map_or((0, Season::Spring), |clock| (clock.current_tick, clock.season()));
        Some(Self {
            tick,
            season,
            config: world.remove_resource::<SimConfig>()?,
            trust: world.remove_resource::<TrustLedger>()?,
            boundaries: world.remove_resource::<BoundaryEngine>()?,
            hunts: world.remove_resource::<HuntCoordinator>()?,
            meat: world.remove_resource::<MeatStore>()?,
            territories: world.remove_resource::<TerritoryRegistry>()?,
            rng: world.remove_resource::<SimRng>()?,
            events: world.remove_resource::<TickEvents>()?,
            environment: world.remove_resource::<EnvironmentHandle>()?,
            motivation: world.remove_resource::<HuntMotivation>()?,
        })
    }

    /// Put every shared resource back into the world
    pub fn restore(self, world: &mut World) {
        world.insert_resource(self.config);
        world.insert_resource(self.trust);
        world.insert_resource(self.boundaries);
        world.insert_resource(self.hunts);
        world.insert_resource(self.meat);
        world.insert_resource(self.territories);
        world.insert_resource(self.rng);
        world.insert_resource(self.events);
        world.insert_resource(self.environment);
        world.insert_resource(self.motivation);
    }
}

pub(crate) fn entity_of(world: &World, id: AgentId) -> Option<Entity> {
    world.get_resource::<Roster>()?.entity(id)
}

pub(crate) fn position_of(world: &World, id: AgentId) -> Option<Position> {
    entity_of(world, id).and_then(|e| world.get::<Position>(e)).copied()
}

pub(crate) fn set_position(world: &mut World, id: AgentId, position: Position) {
    if let Some(mut pos) = entity_of(world, id).and_then(|e| world.get_mut::<Position>(e)) {
        *pos = position;
    }
}

pub(crate) fn set_hunt_group(world: &mut World, id: AgentId, group: Option<HuntGroupId>) {
    if let Some(mut record) = entity_of(world, id).and_then(|e| world.get_mut::<HuntRecord>(e)) {
        record.group = group;
    }
}

/// Crisis state of `id` for emotional heat
pub(crate) fn heat_state(world: &World, ctx: &TurnContext, id: AgentId) -> HeatState {
    let Some(entity) = entity_of(world, id) else {
        return HeatState::default();
    };
    let body = world.get::<Physiology>(entity).cloned().unwrap_or_default();
    HeatState::of(&body, world.get::<Health>(entity), ctx.tick, ctx.trust.config())
}

/// Settle a trust event from `a`'s point of view
pub(crate) fn record_trust(
    world: &World,
    ctx: &mut TurnContext,
    a: AgentId,
    b: AgentId,
    kind: TrustEventKind,
    context: TrustContext,
) -> f32 {
    let state = heat_state(world, ctx, a);
    ctx.trust.record_event(a, b, kind, &state, context, ctx.tick)
}

/// Feed an experience into `agent`'s boundary
pub(crate) fn experience(
    world: &mut World,
    ctx: &mut TurnContext,
    agent: AgentId,
    kind: ExperienceKind,
    target: &ExperienceTarget,
    population: &Population,
) -> Option<ExperienceOutcome> {
    let entity = entity_of(world, agent)?;
    let mut ledger = world.get_mut::<CoherenceLedger>(entity)?;
    let outcome =
        ctx.boundaries
            .process_experience(agent, kind, target, population, &mut ledger, ctx.tick);
    tracing::trace!(
        agent = agent.0,
        kind = %kind.name(),
        object = %outcome.object,
        valence = outcome.valence,
        strength = outcome.strength,
        "experience"
    );
    Some(outcome)
}

/// Check an interaction against the boundaries around `actor`, logging any
/// violation. Aggressive defense drives the actor back.
pub(crate) fn check_interaction(
    world: &mut World,
    ctx: &mut TurnContext,
    actor: AgentId,
    target: &ExperienceTarget,
    kind: InteractionKind,
    population: &Population,
) -> InteractionResult {
    let result = match entity_of(world, actor).and_then(|e| world.get_mut::<CoherenceLedger>(e)) {
        Some(mut ledger) => ctx.boundaries.check_interaction(
            actor,
            target,
            kind,
            population,
            &mut ledger,
            ctx.tick,
        ),
        None => {
            return InteractionResult {
                allowed: true,
                response: InteractionResponse::Neutral,
            }
        }
    };

    if let InteractionResponse::Defense {
        response,
        protector,
        supporters,
    } = &result.response
    {
        ctx.events.push(
            ctx.tick,
            SimEventKind::BoundaryViolation {
                violator: actor.0,
                protector: protector.0,
                target: target.interaction_object(kind).to_string(),
                response: *response,
                supporters: supporters.iter().map(|s| s.0).collect(),
            },
        );
        if *response == DefenseResponse::AggressiveDefense {
            experience(
                world,
                ctx,
                actor,
                ExperienceKind::HostileEncounter,
                &ExperienceTarget::Agent(*protector),
                population,
            );
            experience(
                world,
                ctx,
                *protector,
                ExperienceKind::SuccessfulDefense,
                target,
                population,
            );
            if let (Some(from), Some(threat)) =
                (position_of(world, actor), population.get(*protector).map(|p| p.position))
            {
                let retreat = move_away(from, threat, ctx.config.physiology.move_speed);
                set_position(world, actor, clamp_to_map(retreat, ctx.environment.0.world_size()));
            }
            tracing::debug!(actor = actor.0, protector = protector.0, "forced retreat");
        }
    }
    result
}

/// Step toward `target`. Returns true once within reach.
fn move_to(world: &mut World, ctx: &TurnContext, agent: AgentId, target: Position) -> bool {
    let Some(from) = position_of(world, agent) else {
        return false;
    };
    let next = clamp_to_map(
        move_towards(from, target, ctx.config.physiology.move_speed),
        ctx.environment.0.world_size(),
    );
    set_position(world, agent, next);
    distance(next, target) <= ctx.config.physiology.reach_distance
}

fn nearest_known(
    world: &World,
    ctx: &TurnContext,
    agent: AgentId,
    kind: SiteKind,
) -> Option<GridCell> {
    let entity = entity_of(world, agent)?;
    let knowledge = world.get::<Knowledge>(entity)?;
    let position = *world.get::<Position>(entity)?;
    ctx.environment.0.nearest_known(knowledge, kind, position)
}

fn record_outcome(world: &mut World, agent: AgentId, need: NeedCategory, success: bool) {
    let entity = entity_of(world, agent);
    if let Some(mut ledger) = entity.and_then(|e| world.get_mut::<CoherenceLedger>(e)) {
        ledger.record_outcome(need, success);
    }
}

fn with_body(world: &mut World, agent: AgentId, f: impl FnOnce(&mut Physiology)) {
    if let Some(mut body) = entity_of(world, agent).and_then(|e| world.get_mut::<Physiology>(e)) {
        f(&mut body);
    }
}

/// A refusal still lets a desperate agent through unless it was aggressive
fn may_proceed(result: &InteractionResult, desperate: bool) -> bool {
    result.allowed || (desperate && result.defense() != Some(DefenseResponse::AggressiveDefense))
}

fn exploration_inputs(
    world: &World,
    ctx: &TurnContext,
    view: &AgentView,
    body: &Physiology,
    population: &Population,
) -> ExplorationInputs {
    use turn_constants::*;

    let knowledge = entity_of(world, view.id).and_then(|e| world.get::<Knowledge>(e));
    let coverage = SiteKind::all()
        .iter()
        .map(|kind| {
            let known = knowledge.map_or(0, |k| k.count(*kind));
            let total = ctx.environment.0.site_count(*kind);
            (*kind, Coverage { known, total })
        })
        .collect();
    let allies_need_info = population
        .living_within(view.position, ctx.config.simulation.perception_radius, view.id)
        .any(|other| {
            ctx.trust.get_trust(view.id, other.id) > ALLY_TRUST && other.needs_info_from(view)
        });

    ExplorationInputs {
        tick: ctx.tick,
        body: body.clone(),
        curiosity: view.traits.curiosity,
        coverage,
        allies_need_info,
        strong_relationships: ctx.trust.trusted_by(view.id, RELATIONSHIP_TRUST).len(),
    }
}

/// Run one agent's turn against the world. `None` for unknown or dead agents.
pub fn step(world: &mut World, agent: AgentId) -> Option<StepReport> {
    let mut ctx = TurnContext::take(world)?;
    let report = take_turn(world, &mut ctx, agent);
    ctx.restore(world);
    report
}

/// Exclusive system: every registered agent takes its turn, in id order
pub fn run_agent_turns(world: &mut World) {
    let Some(mut ctx) = TurnContext::take(world) else {
        tracing::debug!("turn resources missing, skipping agent turns");
        return;
    };
    let ids = world
        .get_resource::<Roster>()
        .map(|roster| roster.ids())
        .unwrap_or_default();
    for id in ids {
        take_turn(world, &mut ctx, id);
    }
    ctx.restore(world);
}

/// One agent's decision function, run to completion
pub fn take_turn(world: &mut World, ctx: &mut TurnContext, agent: AgentId) -> Option<StepReport> {
    use turn_constants::*;

    let entity = entity_of(world, agent)?;
    if !world.get::<crate::components::Alive>(entity)?.is_alive() {
        return None;
    }
    let population = Population::capture(world);
    let view = population.get(agent)?.clone();
    let body = world.get::<Physiology>(entity).cloned().unwrap_or_default();
    let record = world.get::<HuntRecord>(entity).cloned().unwrap_or_default();
    let feedback = ctx.environment.0.feedback(view.position, ctx.tick);
    let territory_factor = ctx.territories.coherence_factor(view.territory, view.position);

    let samples = NeedSamples {
        hunger: body.hunger,
        thirst: body.thirst,
        fatigue: body.fatigue,
        territory_factor,
        hunt_attempts: record.attempts,
        hunt_success_rate: record.success_rate(),
        hunt_skill: record.skill(),
        environmental_pressure: feedback.environmental_pressure,
    };
    let inputs = exploration_inputs(world, ctx, &view, &body, &population);

    let (pressures, transition, exploring, intensity, kappa_territory) = {
        let mut query = world.query::<(&mut CoherenceLedger, &mut Exploration)>();
        let (mut ledger, mut exploration) = query.get_mut(world, entity).ok()?;
        let pressures = ledger.update(&samples, &ctx.config.coherence);
        let transition = exploration.update(
            &inputs,
            &mut ledger,
            &ctx.config.physiology,
            &ctx.config.exploration,
            &mut ctx.rng.0,
        );
        (
            pressures,
            transition,
            exploration.is_exploring(),
            exploration.intensity,
            ledger.kappa(Coherence::Territory),
        )
    };
    match transition {
        Some(Transition::Leap {
            pressure,
            intensity,
            energy_after,
        }) => {
            tracing::info!(agent = agent.0, pressure, intensity, "leap into exploration");
            ctx.events.push(
                ctx.tick,
                SimEventKind::Leap {
                    agent: agent.0,
                    pressure,
                    intensity,
                    energy_after,
                },
            );
        }
        Some(Transition::Reversion { cause, duration }) => {
            tracing::info!(agent = agent.0, ?cause, duration, "reverted to settled");
            ctx.events.push(
                ctx.tick,
                SimEventKind::Reversion {
                    agent: agent.0,
                    cause,
                    duration: duration.min(u32::MAX as u64) as u32,
                },
            );
        }
        None => {}
    }

    // A hunting group resolves on its leader's next turn
    let mut forced = None;
    if let Some(group) = ctx
        .hunts
        .led_by(agent)
        .filter(|g| g.status == HuntStatus::Hunting)
        .map(|g| g.id)
    {
        if view.critical {
            abandon_hunt(world, &mut ctx.hunts, group);
        } else {
            forced = Some(ActionKind::Hunt);
        }
    }

    let patient = if view.critical {
        None
    } else {
        find_patient(&population, agent, ctx.config.simulation.perception_radius)
    };
    let willingness = patient.map_or(0.0, |p| {
        care_willingness(view.traits.empathy, ctx.trust.get_trust(agent, p))
    });
    let motivation = ctx.motivation.factor(&MotivationInputs {
        tick: ctx.tick,
        hunger: body.hunger,
        season: ctx.season,
        resource_scarcity: feedback.resource_scarcity,
        success_rate: record.success_rate(),
    });
    let state = SelectorState {
        exploring,
        exploration_intensity: intensity,
        has_territory: view.territory.is_some(),
        territory_factor,
        kappa_territory,
        hunt_motivation: motivation * (SKILL_BASE + record.skill()),
        incapacitated: view.critical,
        care_willingness: willingness,
    };
    let ranked = rank(&pressures, &state);
    let chosen = forced
        .or_else(|| ranked.first().map(|(action, _)| *action))
        .unwrap_or(ActionKind::Explore);

    let performed = perform(world, ctx, &view, chosen, patient, &population);

    let position = position_of(world, agent).unwrap_or(view.position);
    let territory = entity_of(world, agent)
        .and_then(|e| world.get::<crate::components::TerritoryLink>(e))
        .and_then(|link| link.0);
    let energy = world
        .get::<CoherenceLedger>(entity)
        .map_or(0.0, |ledger| ledger.energy());
    let exploration_state = world
        .get::<Exploration>(entity)
        .map(|e| e.snapshot(ctx.tick, energy))?;

    let report = StepReport {
        agent: agent.0,
        tick: ctx.tick,
        chosen_action: performed,
        category_pressures: pressures,
        exploration_state,
        territory_state: ctx.territories.snapshot(territory, position),
    };
    tracing::trace!(agent = agent.0, action = ?performed, "turn complete");
    ctx.events.push(ctx.tick, SimEventKind::Step(report.clone()));
    Some(report)
}

/// Execute an action. Returns the action actually performed, which differs
/// from `chosen` when missing knowledge forces a fallback.
fn perform(
    world: &mut World,
    ctx: &mut TurnContext,
    view: &AgentView,
    chosen: ActionKind,
    patient: Option<AgentId>,
    population: &Population,
) -> ActionKind {
    match chosen {
        ActionKind::SeekWater => seek_water(world, ctx, view, population),
        ActionKind::SeekFood => seek_food(world, ctx, view, population),
        ActionKind::Rest => rest(world, ctx, view, population),
        ActionKind::ReturnToTerritory => {
            match view.territory.and_then(|id| ctx.territories.get(id)) {
                Some(territory) => {
                    let home = territory.center.to_position();
                    move_to(world, ctx, view.id, home);
                    ActionKind::ReturnToTerritory
                }
                None => explore(world, ctx, view, population),
            }
        }
        ActionKind::StrengthenTerritory => {
            strengthen(world, ctx, view.id, population);
            ActionKind::StrengthenTerritory
        }
        ActionKind::Hunt => hunt(world, ctx, view, population),
        ActionKind::CareForInjured => match patient {
            Some(patient) => {
                offer_care(world, ctx, view.id, patient, population);
                ActionKind::CareForInjured
            }
            None => explore(world, ctx, view, population),
        },
        ActionKind::Explore => explore(world, ctx, view, population),
    }
}

fn seek_water(
    world: &mut World,
    ctx: &mut TurnContext,
    view: &AgentView,
    population: &Population,
) -> ActionKind {
    let Some(cell) = nearest_known(world, ctx, view.id, SiteKind::Water) else {
        tracing::debug!(agent = view.id.0, "no known water, exploring instead");
        return explore(world, ctx, view, population);
    };
    if !move_to(world, ctx, view.id, cell.to_position()) {
        return ActionKind::SeekWater;
    }

    let target = ExperienceTarget::Named(format!("water_{}_{}", cell.x, cell.y));
    let result = check_interaction(
        world,
        ctx,
        view.id,
        &target,
        InteractionKind::ResourceUse,
        population,
    );
    let desperate = view.thirst > ctx.config.physiology.thirst_danger;
    if !may_proceed(&result, desperate) {
        record_outcome(world, view.id, NeedCategory::Thirst, false);
        return ActionKind::SeekWater;
    }

    let relief = ctx.config.physiology.drink_relief;
    with_body(world, view.id, |body| body.add_thirst(-relief));
    record_outcome(world, view.id, NeedCategory::Thirst, true);
    experience(world, ctx, view.id, ExperienceKind::WaterAccess, &target, population);
    ActionKind::SeekWater
}

fn seek_food(
    world: &mut World,
    ctx: &mut TurnContext,
    view: &AgentView,
    population: &Population,
) -> ActionKind {
    let physiology = ctx.config.physiology.clone();

    // meat in hand comes first
    if let Some((units, freshness)) = ctx.meat.take_owned(view.id, physiology.meal_size) {
        let relief =
            units * physiology.meat_hunger_per_unit * ctx.meat.nutrition_value() * freshness;
        with_body(world, view.id, |body| body.add_hunger(-relief));
        record_outcome(world, view.id, NeedCategory::Hunger, true);
        tracing::trace!(agent = view.id.0, units, relief, "ate meat");
        return ActionKind::SeekFood;
    }

    let Some(cell) = nearest_known(world, ctx, view.id, SiteKind::Berries) else {
        tracing::debug!(agent = view.id.0, "no known berries, exploring instead");
        return explore(world, ctx, view, population);
    };
    if !move_to(world, ctx, view.id, cell.to_position()) {
        return ActionKind::SeekFood;
    }

    let target = ExperienceTarget::Named(format!("berries_{}_{}", cell.x, cell.y));
    let result = check_interaction(
        world,
        ctx,
        view.id,
        &target,
        InteractionKind::ResourceUse,
        population,
    );
    let desperate = view.hunger > physiology.hunger_danger;
    if !may_proceed(&result, desperate) {
        record_outcome(world, view.id, NeedCategory::Hunger, false);
        return ActionKind::SeekFood;
    }

    let chance = ctx.environment.0.forage_chance(ctx.tick);
    let found = ctx.rng.0.gen::<f32>() < chance;
    if found {
        with_body(world, view.id, |body| body.add_hunger(-physiology.forage_relief));
    }
    record_outcome(world, view.id, NeedCategory::Hunger, found);
    let kind = if found {
        ExperienceKind::SuccessfulForaging
    } else {
        ExperienceKind::FailedForaging
    };
    experience(world, ctx, view.id, kind, &target, population);
    ActionKind::SeekFood
}

fn rest(
    world: &mut World,
    ctx: &mut TurnContext,
    view: &AgentView,
    population: &Population,
) -> ActionKind {
    use turn_constants::*;

    let physiology = ctx.config.physiology.clone();
    let cave = if view.critical {
        None
    } else {
        nearest_known(world, ctx, view.id, SiteKind::Cave)
            .filter(|cave| distance(view.position, cave.to_position()) <= REST_CAVE_RANGE)
    };

    let Some(cave) = cave else {
        with_body(world, view.id, |body| body.add_fatigue(-physiology.rest_relief_open));
        record_outcome(world, view.id, NeedCategory::Fatigue, true);
        return ActionKind::Rest;
    };
    if !move_to(world, ctx, view.id, cave.to_position()) {
        return ActionKind::Rest;
    }

    with_body(world, view.id, |body| body.add_fatigue(-physiology.rest_relief_sheltered));
    record_outcome(world, view.id, NeedCategory::Fatigue, true);
    let entity = entity_of(world, view.id);
    if let Some(mut knowledge) = entity.and_then(|e| world.get_mut::<Knowledge>(e)) {
        knowledge.record_rest(cave);
    }
    experience(
        world,
        ctx,
        view.id,
        ExperienceKind::SafeRest,
        &ExperienceTarget::Location(cave),
        population,
    );
    try_claim(world, ctx, view.id, cave, population);
    ActionKind::Rest
}

fn hunt(
    world: &mut World,
    ctx: &mut TurnContext,
    view: &AgentView,
    population: &Population,
) -> ActionKind {
    if let Some(group) = ctx.hunts.led_by(view.id).map(|g| g.id) {
        resolve_hunt(world, ctx, group, population);
        return ActionKind::Hunt;
    }

    // followers stay with their leader until the hunt resolves
    if let Some(leader) = view
        .hunt_group
        .and_then(|id| ctx.hunts.get(id))
        .map(|g| g.leader)
    {
        if let Some(at) = population.get(leader).filter(|l| l.alive).map(|l| l.position) {
            move_to(world, ctx, view.id, at);
        }
        return ActionKind::Hunt;
    }

    let Some(ground) = nearest_known(world, ctx, view.id, SiteKind::HuntingGround) else {
        tracing::debug!(agent = view.id.0, "no known hunting ground, exploring instead");
        return explore(world, ctx, view, population);
    };
    if move_to(world, ctx, view.id, ground.to_position()) {
        organize_hunt(world, ctx, view.id, population);
    }
    ActionKind::Hunt
}

fn explore(
    world: &mut World,
    ctx: &mut TurnContext,
    view: &AgentView,
    population: &Population,
) -> ActionKind {
    if view.critical {
        return rest(world, ctx, view, population);
    }
    let size = ctx.environment.0.world_size();
    let from = position_of(world, view.id).unwrap_or(view.position);
    let wander = ctx.config.exploration.wander_distance;
    let angle = ctx.rng.0.gen_range(0.0..TAU);
    let reach = ctx.rng.0.gen_range(0.0..=wander);
    let target = clamp_to_map(
        Position::new(from.x + angle.cos() * reach, from.y + angle.sin() * reach),
        size,
    );
    move_to(world, ctx, view.id, target);
    discover(world, ctx, view.id, population);
    ActionKind::Explore
}

/// Learn every site within discovery radius. Returns how many were new.
fn discover(
    world: &mut World,
    ctx: &mut TurnContext,
    agent: AgentId,
    population: &Population,
) -> usize {
    let Some(entity) = entity_of(world, agent) else {
        return 0;
    };
    let Some(position) = position_of(world, agent) else {
        return 0;
    };
    let sites: Vec<Site> = ctx
        .environment
        .0
        .sites_within(position, ctx.config.exploration.discovery_radius);
    let e_max = ctx.config.coherence.e_max;

    let mut found = Vec::new();
    {
        let mut query = world.query::<(&mut Knowledge, &mut Exploration, &mut CoherenceLedger)>();
        let Ok((mut knowledge, mut exploration, mut ledger)) = query.get_mut(world, entity) else {
            return 0;
        };
        for site in sites {
            if knowledge.learn(site) {
                let pressure = exploration.last_pressure;
                exploration.record_discovery(ctx.tick, site.kind, pressure, &mut ledger, e_max);
                found.push(site);
            }
        }
    }
    for site in &found {
        tracing::debug!(agent = agent.0, kind = ?site.kind, cell = %site.cell, "site discovered");
        experience(
            world,
            ctx,
            agent,
            ExperienceKind::ExplorationDiscovery,
            &ExperienceTarget::Location(site.cell),
            population,
        );
    }
    found.len()
}

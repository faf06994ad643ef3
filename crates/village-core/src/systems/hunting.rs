//! Hunting / Resource Coordinator
//!
//! A leader forms a hunt group, recruits nearby hunters and resolves the
//! hunt on its next turn. Groups move forming -> hunting -> disbanded and are
//! removed from the coordinator when resolved, so a group can never resolve
//! twice. Successful hunts create a decaying `MeatResource` owned by the
//! leader, who shares it out with the other members.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use village_events::{NeedCategory, SimEventKind};

use super::boundary::{ExperienceKind, ExperienceTarget};
use super::coherence::{Coherence, CoherenceLedger};
use super::perception::Population;
use super::trust::{TrustContext, TrustEventKind};
use super::turn::{entity_of, experience, heat_state, record_trust, set_hunt_group, TurnContext};
use crate::components::{AgentId, Health, HuntGroupId, HuntRecord, Physiology, Traits};
use crate::config::HuntingConfig;
use crate::movement::distance;

/// Constants for hunt resolution and recruitment
pub mod hunt_constants {
    /// Group hunts spread the risk of a critical wound
    pub const GROUP_CRITICAL_FACTOR: f32 = 0.5;
    /// A successful hunt halves the injury chance
    pub const SUCCESS_INJURY_FACTOR: f32 = 0.5;
    pub const SUCCESS_DAMAGE: (f32, f32) = (2.0, 8.0);
    pub const FAILURE_DAMAGE: (f32, f32) = (3.0, 10.0);

    /// Success pleasure discharges E
    pub const PLEASURE_PER_MEAT: f32 = 0.6;
    pub const BONDING_PER_MEMBER: f32 = 0.1;
    pub const PLEASURE_DISCHARGE: f32 = 0.5;
    pub const GROUP_KAPPA_GAIN: f32 = 0.25;

    /// Participation weights
    pub const JOIN_RISK: f32 = 0.4;
    pub const JOIN_SOCIAL: f32 = 0.3;
    pub const JOIN_HUNGER: f32 = 0.2;
    pub const JOIN_TRUST: f32 = 0.3;
    pub const JOIN_HUNGER_SCALE: f32 = 200.0;

    /// Leaders this bold aim for large prey
    pub const BOLD_LEADER: f32 = 0.7;

    /// Meat below this freshness is spoiled
    pub const SPOILED_FRESHNESS: f32 = 0.1;
}

/// Prey categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreyKind {
    Small,
    Medium,
    Large,
}

impl PreyKind {
    pub fn all() -> &'static [PreyKind] {
        &[PreyKind::Small, PreyKind::Medium, PreyKind::Large]
    }

    pub fn name(self) -> &'static str {
        match self {
            PreyKind::Small => "small_game",
            PreyKind::Medium => "medium_game",
            PreyKind::Large => "large_game",
        }
    }

    pub fn meat(self) -> f32 {
        match self {
            PreyKind::Small => 10.0,
            PreyKind::Medium => 8.0,
            PreyKind::Large => 20.0,
        }
    }

    /// Subtracted from the success chance
    pub fn difficulty_penalty(self) -> f32 {
        match self {
            PreyKind::Small => 0.0,
            PreyKind::Medium => 0.2,
            PreyKind::Large => 0.4,
        }
    }

    /// Chance of a wound, shared across the group
    pub fn danger(self) -> f32 {
        match self {
            PreyKind::Small => 0.1,
            PreyKind::Medium => 0.3,
            PreyKind::Large => 0.5,
        }
    }

    pub fn required_hunters(self) -> usize {
        match self {
            PreyKind::Small => 1,
            PreyKind::Medium => 2,
            PreyKind::Large => 4,
        }
    }

    /// Largest prey `hunters` can take on, capped at `target`
    pub fn feasible(target: PreyKind, hunters: usize) -> PreyKind {
        PreyKind::all()
            .iter()
            .rev()
            .copied()
            .find(|p| *p <= target && p.required_hunters() <= hunters)
            .unwrap_or(PreyKind::Small)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HuntStatus {
    Forming,
    Hunting,
    Disbanded,
}

/// A hunt group. The leader is always the first member.
#[derive(Debug, Clone, PartialEq)]
pub struct HuntGroup {
    pub id: HuntGroupId,
    pub leader: AgentId,
    pub members: Vec<AgentId>,
    pub prey: PreyKind,
    pub status: HuntStatus,
    pub formed_at: u64,
}

impl HuntGroup {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.members.contains(&agent)
    }
}

/// base + min(hunters × bonus, cap) − difficulty, within [min, max]
pub fn success_rate(config: &HuntingConfig, hunters: usize, prey: PreyKind) -> f32 {
    let bonus = (hunters as f32 * config.per_member_bonus).min(config.max_member_bonus);
    (config.base_success + bonus - prey.difficulty_penalty())
        .clamp(config.min_success, config.max_success)
}

/// Chance a candidate answers the leader's call
pub fn join_probability(traits: &Traits, hunger: f32, trust_in_leader: f32) -> f32 {
    use hunt_constants::*;

    let hunger = (hunger / JOIN_HUNGER_SCALE).min(1.0);
    (traits.risk_tolerance * JOIN_RISK
        + traits.sociability * JOIN_SOCIAL
        + hunger * JOIN_HUNGER
        + trust_in_leader * JOIN_TRUST)
        .clamp(0.0, 1.0)
}

/// Resource: every hunt group that has not been resolved yet
#[derive(Resource, Debug, Clone, Default)]
pub struct HuntCoordinator {
    groups: BTreeMap<HuntGroupId, HuntGroup>,
    next_id: u32,
    config: HuntingConfig,
}

impl HuntCoordinator {
    pub fn new(config: HuntingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &HuntingConfig {
        &self.config
    }

    /// Open a forming group with the leader as its only member
    pub fn form(&mut self, leader: AgentId, prey: PreyKind, tick: u64) -> HuntGroupId {
        let id = HuntGroupId(self.next_id);
        self.next_id += 1;
        self.groups.insert(
            id,
            HuntGroup {
                id,
                leader,
                members: vec![leader],
                prey,
                status: HuntStatus::Forming,
                formed_at: tick,
            },
        );
        id
    }

    pub fn get(&self, id: HuntGroupId) -> Option<&HuntGroup> {
        self.groups.get(&id)
    }

    pub fn led_by(&self, leader: AgentId) -> Option<&HuntGroup> {
        self.groups.values().find(|g| g.leader == leader)
    }

    /// Add a recruit to a forming group. Fails once the group is full.
    pub fn add_member(&mut self, id: HuntGroupId, agent: AgentId) -> bool {
        let limit = self.config.max_recruits + 1;
        match self.groups.get_mut(&id) {
            Some(group)
                if group.status == HuntStatus::Forming
                    && group.members.len() < limit
                    && !group.contains(agent) =>
            {
                group.members.push(agent);
                true
            }
            _ => false,
        }
    }

    /// Start the hunt, retargeting to the largest prey the group can take on
    pub fn begin(&mut self, id: HuntGroupId) -> Option<PreyKind> {
        let group = self.groups.get_mut(&id)?;
        if group.status != HuntStatus::Forming {
            return None;
        }
        group.prey = PreyKind::feasible(group.prey, group.members.len());
        group.status = HuntStatus::Hunting;
        Some(group.prey)
    }

    /// Remove a hunting group for resolution. A group comes out of here at
    /// most once.
    pub fn take_for_resolution(&mut self, id: HuntGroupId) -> Option<HuntGroup> {
        if self.groups.get(&id)?.status != HuntStatus::Hunting {
            return None;
        }
        self.disband(id)
    }

    /// Remove a group whatever its status
    pub fn disband(&mut self, id: HuntGroupId) -> Option<HuntGroup> {
        let mut group = self.groups.remove(&id)?;
        group.status = HuntStatus::Disbanded;
        Some(group)
    }

    pub fn disband_led_by(&mut self, leader: AgentId) -> Vec<HuntGroup> {
        let ids: Vec<HuntGroupId> = self
            .groups
            .values()
            .filter(|g| g.leader == leader)
            .map(|g| g.id)
            .collect();
        ids.into_iter().filter_map(|id| self.disband(id)).collect()
    }

    /// Drop an agent from every group it follows
    pub fn remove_member(&mut self, agent: AgentId) {
        for group in self.groups.values_mut() {
            if group.leader != agent {
                group.members.retain(|m| *m != agent);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Fresh meat from a successful hunt
#[derive(Debug, Clone, PartialEq)]
pub struct MeatResource {
    pub amount: f32,
    pub freshness: f32,
    pub owner: AgentId,
    pub hunt_group: Option<HuntGroupId>,
    pub created_at: u64,
}

impl MeatResource {
    pub fn new(amount: f32, owner: AgentId, hunt_group: Option<HuntGroupId>, tick: u64) -> Self {
        Self {
            amount: amount.max(0.0),
            freshness: 1.0,
            owner,
            hunt_group,
            created_at: tick,
        }
    }

    /// One tick of spoilage. Returns true once nothing edible is left.
    pub fn decay(&mut self, rate: f32) -> bool {
        self.freshness = (self.freshness * (1.0 - rate.clamp(0.0, 1.0))).clamp(0.0, 1.0);
        if self.freshness < hunt_constants::SPOILED_FRESHNESS {
            self.amount = 0.0;
        }
        self.amount <= 0.0
    }

    /// Recomputed on every call
    pub fn effective_nutrition(&self, nutrition_value: f32) -> f32 {
        self.amount * nutrition_value * self.freshness
    }

    /// Cut off up to `amount`, returning what was taken
    pub fn take(&mut self, amount: f32) -> f32 {
        let taken = amount.max(0.0).min(self.amount);
        self.amount -= taken;
        taken
    }
}

/// Resource: all meat in the world, by id
#[derive(Resource, Debug, Clone)]
pub struct MeatStore {
    items: BTreeMap<u32, MeatResource>,
    next_id: u32,
    decay_rate: f32,
    nutrition_value: f32,
}

impl Default for MeatStore {
    fn default() -> Self {
        Self::new(&HuntingConfig::default())
    }
}

impl MeatStore {
    pub fn new(config: &HuntingConfig) -> Self {
        Self {
            items: BTreeMap::new(),
            next_id: 0,
            decay_rate: config.meat_decay_rate,
            nutrition_value: config.nutrition_value,
        }
    }

    pub fn create(&mut self, meat: MeatResource) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, meat);
        id
    }

    pub fn get(&self, id: u32) -> Option<&MeatResource> {
        self.items.get(&id)
    }

    /// Take from one resource: (amount taken, its freshness)
    pub fn take(&mut self, id: u32, amount: f32) -> Option<(f32, f32)> {
        let item = self.items.get_mut(&id)?;
        let freshness = item.freshness;
        let taken = item.take(amount);
        if item.amount <= 0.0 {
            self.items.remove(&id);
        }
        (taken > 0.0).then_some((taken, freshness))
    }

    /// Take from the freshest meat `owner` holds
    pub fn take_owned(&mut self, owner: AgentId, amount: f32) -> Option<(f32, f32)> {
        let id = self
            .items
            .iter()
            .filter(|(_, m)| m.owner == owner && m.amount > 0.0)
            .max_by(|a, b| a.1.freshness.total_cmp(&b.1.freshness).then_with(|| b.0.cmp(a.0)))
            .map(|(id, _)| *id)?;
        self.take(id, amount)
    }

    pub fn owned_amount(&self, owner: AgentId) -> f32 {
        self.items
            .values()
            .filter(|m| m.owner == owner)
            .map(|m| m.amount)
            .sum()
    }

    pub fn effective_nutrition(&self, owner: AgentId) -> f32 {
        self.items
            .values()
            .filter(|m| m.owner == owner)
            .map(|m| m.effective_nutrition(self.nutrition_value))
            .sum()
    }

    pub fn nutrition_value(&self) -> f32 {
        self.nutrition_value
    }

    /// Spoil everything by one tick and reap what is gone
    pub fn decay_all(&mut self) -> usize {
        let rate = self.decay_rate;
        let before = self.items.len();
        self.items.retain(|_, m| !m.decay(rate));
        before - self.items.len()
    }

    pub fn forget_owner(&mut self, owner: AgentId) {
        self.items.retain(|_, m| m.owner != owner);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// System: spoil meat once per tick
pub fn decay_meat(mut store: ResMut<MeatStore>) {
    let reaped = store.decay_all();
    if reaped > 0 {
        tracing::trace!(reaped, "meat spoiled");
    }
}

/// What a resolved hunt produced
#[derive(Debug, Clone, PartialEq)]
pub struct HuntOutcome {
    pub group: HuntGroupId,
    pub success: bool,
    pub success_rate: f32,
    pub meat: f32,
    pub injured: Vec<AgentId>,
}

/// The leader opens a group, calls nearby hunters and starts the hunt.
/// The group resolves on the leader's next turn.
pub fn organize_hunt(
    world: &mut World,
    ctx: &mut TurnContext,
    leader: AgentId,
    population: &Population,
) -> Option<HuntGroupId> {
    let view = population.get(leader)?;
    if view.hunt_group.is_some() || ctx.hunts.led_by(leader).is_some() {
        return None;
    }

    let target = if view.traits.risk_tolerance > hunt_constants::BOLD_LEADER {
        PreyKind::Large
    } else {
        PreyKind::Medium
    };
    let id = ctx.hunts.form(leader, target, ctx.tick);
    set_hunt_group(world, leader, Some(id));

    let config = ctx.hunts.config().clone();
    let mut candidates: Vec<(f32, AgentId)> = population
        .living()
        .filter(|c| c.id != leader && c.hunt_group.is_none() && !c.critical)
        .filter(|c| c.fatigue < config.exhaustion_limit)
        .map(|c| (distance(view.position, c.position), c.id))
        .filter(|(d, _)| *d <= config.recruit_radius)
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut recruited = 0;
    for (_, candidate) in candidates {
        if recruited >= config.max_recruits {
            break;
        }
        let Some(c) = population.get(candidate) else {
            continue;
        };
        let p = join_probability(&c.traits, c.hunger, ctx.trust.get_trust(candidate, leader));
        if ctx.rng.0.gen::<f32>() < p && ctx.hunts.add_member(id, candidate) {
            set_hunt_group(world, candidate, Some(id));
            recruited += 1;
        }
    }

    let prey = ctx.hunts.begin(id)?;
    let members: Vec<u32> = ctx
        .hunts
        .get(id)
        .map(|g| g.members.iter().map(|m| m.0).collect())
        .unwrap_or_default();
    tracing::info!(
        group = id.0,
        leader = leader.0,
        members = members.len(),
        prey = prey.name(),
        "hunt group formed"
    );
    ctx.events.push(
        ctx.tick,
        SimEventKind::HuntFormed {
            group: id.0,
            leader: leader.0,
            members,
            prey: prey.name().to_string(),
        },
    );
    Some(id)
}

/// Resolve a hunting group: roll success, pay costs, hand out meat, roll
/// injuries, then clear every member's group reference. Returns `None` if
/// the group is unknown or already resolved.
pub fn resolve_hunt(
    world: &mut World,
    ctx: &mut TurnContext,
    id: HuntGroupId,
    population: &Population,
) -> Option<HuntOutcome> {
    use hunt_constants::*;

    let group = ctx.hunts.take_for_resolution(id)?;
    let config = ctx.hunts.config().clone();
    let tick = ctx.tick;

    let hunters: Vec<AgentId> = group
        .members
        .iter()
        .copied()
        .filter(|m| population.is_alive(*m))
        .collect();
    let n = hunters.len().max(1);
    let rate = success_rate(&config, n, group.prey);
    let success = ctx.rng.0.gen::<f32>() < rate;

    for hunter in &hunters {
        let Some(entity) = entity_of(world, *hunter) else {
            continue;
        };
        let mut agent = world.entity_mut(entity);
        if let Some(mut body) = agent.get_mut::<Physiology>() {
            body.add_fatigue(config.fatigue_cost);
        }
        if let Some(mut record) = agent.get_mut::<HuntRecord>() {
            record.attempts += 1;
            if success {
                record.successes += 1;
            }
        }
        if let Some(mut ledger) = agent.get_mut::<CoherenceLedger>() {
            ledger.record_outcome(NeedCategory::Hunting, success);
        }
    }

    let mut meat = 0.0;
    if success {
        meat = group.prey.meat();
        let pleasure = (meat / n as f32 * PLEASURE_PER_MEAT + n as f32 * BONDING_PER_MEMBER)
            * PLEASURE_DISCHARGE;
        for hunter in &hunters {
            if let Some(mut ledger) =
                entity_of(world, *hunter).and_then(|e| world.get_mut::<CoherenceLedger>(e))
            {
                ledger.drain_energy(pleasure);
                if n > 1 {
                    ledger.adjust_kappa(Coherence::GroupHunting, GROUP_KAPPA_GAIN);
                }
            }
        }
        for a in &hunters {
            for b in &hunters {
                if a != b {
                    record_trust(
                        world,
                        ctx,
                        *a,
                        *b,
                        TrustEventKind::HuntTogetherSuccess,
                        TrustContext::shared_danger(),
                    );
                }
            }
        }

        let kind = if n > 1 {
            ExperienceKind::GroupHunting
        } else {
            ExperienceKind::SuccessfulHunting
        };
        let prey = ExperienceTarget::Named(group.prey.name().to_string());
        for hunter in &hunters {
            experience(world, ctx, *hunter, kind, &prey, population);
        }
        if n > 1 {
            ctx.boundaries.integrate_hunt_group(id, &hunters, tick);
        }

        let meat_id = ctx
            .meat
            .create(MeatResource::new(meat, group.leader, Some(id), tick));
        let share = meat / n as f32;
        for member in hunters.iter().filter(|m| **m != group.leader) {
            if let Some((taken, freshness)) = ctx.meat.take(meat_id, share) {
                receive_meat_gift(world, ctx, *member, group.leader, taken, freshness);
            }
        }
    } else {
        let pressure = config.failure_pressure / n as f32;
        let e_max = ctx.config.coherence.e_max;
        for hunter in &hunters {
            if let Some(mut ledger) =
                entity_of(world, *hunter).and_then(|e| world.get_mut::<CoherenceLedger>(e))
            {
                ledger.add_energy(pressure, e_max);
            }
        }
    }

    let mut injured = Vec::new();
    let mut injury_rate = group.prey.danger() / n as f32;
    if success {
        injury_rate *= SUCCESS_INJURY_FACTOR;
    }
    let critical_rate = if n > 1 {
        config.critical_injury_chance * GROUP_CRITICAL_FACTOR
    } else {
        config.critical_injury_chance
    };
    for hunter in &hunters {
        if ctx.rng.0.gen::<f32>() >= injury_rate {
            continue;
        }
        let (low, high) = if success { SUCCESS_DAMAGE } else { FAILURE_DAMAGE };
        let damage = ctx.rng.0.gen_range(low..=high);
        let critical = ctx.rng.0.gen::<f32>() < critical_rate;
        let duration = if critical {
            let care = &ctx.config.care;
            ctx.rng
                .0
                .gen_range(care.min_critical_duration..=care.max_critical_duration) as f32
        } else {
            ctx.config.care.minor_duration as f32
        };
        let Some(entity) = entity_of(world, *hunter) else {
            continue;
        };
        let mut agent = world.entity_mut(entity);
        if let Some(mut body) = agent.get_mut::<Physiology>() {
            body.add_fatigue(damage);
        }
        if let Some(mut health) = agent.get_mut::<Health>() {
            health.injure(tick, critical, duration);
        }
        if critical {
            tracing::info!(agent = hunter.0, duration, "critical hunting injury");
        }
        injured.push(*hunter);
    }
    for wounded in &injured {
        for other in hunters.iter().filter(|h| *h != wounded) {
            record_trust(
                world,
                ctx,
                *other,
                *wounded,
                TrustEventKind::HuntTogetherInjury,
                TrustContext::shared_danger(),
            );
        }
    }

    // Last step: nobody may still point at this group
    clear_hunt_refs(world, &group);

    tracing::info!(
        group = id.0,
        success,
        success_rate = rate,
        hunters = n,
        injured = injured.len(),
        "hunt resolved"
    );
    ctx.events.push(
        tick,
        SimEventKind::HuntResolved {
            group: id.0,
            success,
            success_rate: rate,
            meat,
            injured: injured.iter().map(|a| a.0).collect(),
        },
    );

    Some(HuntOutcome {
        group: id,
        success,
        success_rate: rate,
        meat,
        injured,
    })
}

/// Clear the group reference of every member still pointing at `group`
pub fn clear_hunt_refs(world: &mut World, group: &HuntGroup) {
    for member in &group.members {
        if entity_of(world, *member)
            .and_then(|e| world.get::<HuntRecord>(e))
            .is_some_and(|r| r.group == Some(group.id))
        {
            set_hunt_group(world, *member, None);
        }
    }
}

/// Call off a group without resolving it
pub fn abandon_hunt(
    world: &mut World,
    hunts: &mut HuntCoordinator,
    id: HuntGroupId,
) -> Option<HuntGroup> {
    let group = hunts.disband(id)?;
    clear_hunt_refs(world, &group);
    tracing::debug!(group = id.0, leader = group.leader.0, "hunt abandoned");
    Some(group)
}

/// Eat a gift of meat. Trust toward the giver depends on how hungry the
/// receiver still is afterwards. Returns the new trust.
pub fn receive_meat_gift(
    world: &mut World,
    ctx: &mut TurnContext,
    receiver: AgentId,
    giver: AgentId,
    amount: f32,
    freshness: f32,
) -> Option<f32> {
    let entity = entity_of(world, receiver)?;
    let nutrition = amount * ctx.meat.nutrition_value() * freshness;
    let relief = nutrition * ctx.config.physiology.meat_hunger_per_unit;

    let hunger = {
        let mut body = world.get_mut::<Physiology>(entity)?;
        body.add_hunger(-relief);
        body.hunger
    };
    if let Some(mut ledger) = world.get_mut::<CoherenceLedger>(entity) {
        ledger.record_outcome(NeedCategory::Hunger, true);
    }

    let kind = if hunger > 180.0 {
        TrustEventKind::FoodInHunger
    } else if hunger > 150.0 {
        TrustEventKind::MeatShareStarving
    } else {
        TrustEventKind::CasualFoodShare
    };
    let context = TrustContext {
        desperate: hunger > 200.0,
        ..TrustContext::NONE
    };
    let state = heat_state(world, ctx, receiver);
    let trust = ctx
        .trust
        .record_event(receiver, giver, kind, &state, context, ctx.tick);
    ctx.boundaries.integrate_meat_sharing(giver, receiver, ctx.tick);

    tracing::debug!(
        giver = giver.0,
        receiver = receiver.0,
        amount,
        nutrition,
        trust,
        "meat shared"
    );
    ctx.events.push(
        ctx.tick,
        SimEventKind::MeatShared {
            giver: giver.0,
            receiver: receiver.0,
            amount,
            trust_after: trust,
        },
    );
    Some(trust)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Position, Role};
    use crate::config::SimConfig;
    use crate::systems::testing::{spawn_test_agent, test_world};

    #[test]
    fn test_medium_game_rate_with_two_recruits() {
        let config = HuntingConfig::default();
        let rate = success_rate(&config, 3, PreyKind::Medium);
        assert!((rate - 0.6).abs() < 1e-6);
        assert_eq!(PreyKind::Medium.required_hunters(), 2);
    }

    #[test]
    fn test_rate_clamped() {
        let config = HuntingConfig::default();
        assert!((success_rate(&config, 10, PreyKind::Small) - 0.8).abs() < 1e-6);
        assert!((success_rate(&config, 1, PreyKind::Large) - 0.15).abs() < 1e-6);
        let generous = HuntingConfig {
            base_success: 0.9,
            ..HuntingConfig::default()
        };
        assert!((success_rate(&generous, 4, PreyKind::Small) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_resolved_hunts_succeed_at_the_group_rate() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 2024);
        let leader = spawn_test_agent(&mut world, Role::Leader, Position::new(10.0, 10.0));
        let a = spawn_test_agent(&mut world, Role::Warrior, Position::new(11.0, 10.0));
        let b = spawn_test_agent(&mut world, Role::Tracker, Position::new(12.0, 10.0));
        let population = Population::capture(&mut world);

        let trials = 10_000;
        let mut successes = 0;
        for _ in 0..trials {
            let id = ctx.hunts.form(leader, PreyKind::Medium, 0);
            for member in [a, b] {
                assert!(ctx.hunts.add_member(id, member));
            }
            assert_eq!(ctx.hunts.begin(id), Some(PreyKind::Medium));
            let outcome = resolve_hunt(&mut world, &mut ctx, id, &population).unwrap();
            assert!((outcome.success_rate - 0.6).abs() < 1e-6);
            if outcome.success {
                successes += 1;
            }
        }
        let observed = successes as f32 / trials as f32;
        assert!((observed - 0.6).abs() < 0.02, "observed {}", observed);

        let entity = entity_of(&world, leader).unwrap();
        let record = world.get::<HuntRecord>(entity).unwrap();
        assert_eq!(record.attempts, trials);
        assert_eq!(record.successes, successes);
    }

    #[test]
    fn test_feasible_prey() {
        assert_eq!(PreyKind::feasible(PreyKind::Large, 3), PreyKind::Medium);
        assert_eq!(PreyKind::feasible(PreyKind::Large, 4), PreyKind::Large);
        assert_eq!(PreyKind::feasible(PreyKind::Medium, 1), PreyKind::Small);
        assert_eq!(PreyKind::feasible(PreyKind::Small, 5), PreyKind::Small);
    }

    #[test]
    fn test_group_lifecycle() {
        let mut hunts = HuntCoordinator::new(HuntingConfig::default());
        let id = hunts.form(AgentId(1), PreyKind::Medium, 0);
        assert!(hunts.add_member(id, AgentId(2)));
        assert!(!hunts.add_member(id, AgentId(2)));
        assert!(hunts.take_for_resolution(id).is_none());

        assert_eq!(hunts.begin(id), Some(PreyKind::Medium));
        assert!(!hunts.add_member(id, AgentId(3)));
        let group = hunts.take_for_resolution(id).unwrap();
        assert_eq!(group.status, HuntStatus::Disbanded);
        assert!(hunts.take_for_resolution(id).is_none());
        assert!(hunts.is_empty());
    }

    #[test]
    fn test_meat_spoils_to_zero() {
        let mut meat = MeatResource::new(10.0, AgentId(0), None, 0);
        let mut ticks = 0;
        while meat.freshness >= 0.1 {
            let nutrition = meat.effective_nutrition(0.8);
            assert!((nutrition - meat.amount * 0.8 * meat.freshness).abs() < 1e-6);
            meat.decay(0.15);
            ticks += 1;
        }
        assert_eq!(ticks, 15);
        assert_eq!(meat.amount, 0.0);
        assert_eq!(meat.effective_nutrition(0.8), 0.0);
    }

    #[test]
    fn test_meat_store_reaps_spoiled() {
        let mut store = MeatStore::new(&HuntingConfig::default());
        store.create(MeatResource::new(10.0, AgentId(0), None, 0));
        let mut world = World::new();
        world.insert_resource(store);
        let mut schedule = Schedule::default();
        schedule.add_systems(decay_meat);
        for _ in 0..14 {
            schedule.run(&mut world);
        }
        assert_eq!(world.resource::<MeatStore>().len(), 1);
        schedule.run(&mut world);
        assert!(world.resource::<MeatStore>().is_empty());
    }

    #[test]
    fn test_take_owned_prefers_fresh() {
        let mut store = MeatStore::default();
        let mut old = MeatResource::new(5.0, AgentId(1), None, 0);
        old.freshness = 0.5;
        store.create(old);
        store.create(MeatResource::new(5.0, AgentId(1), None, 3));
        let (taken, freshness) = store.take_owned(AgentId(1), 2.0).unwrap();
        assert_eq!(taken, 2.0);
        assert_eq!(freshness, 1.0);
        assert!((store.owned_amount(AgentId(1)) - 8.0).abs() < 1e-6);
        assert!(store.take_owned(AgentId(9), 1.0).is_none());
    }

    #[test]
    fn test_join_probability_blend() {
        let traits = Traits::new(0.5, 1.0, 1.0, 0.5);
        let p = join_probability(&traits, 100.0, 0.5);
        assert!((p - (0.4 + 0.3 + 0.1 + 0.15)).abs() < 1e-6);
    }

    #[test]
    fn test_resolve_twice_is_noop_and_clears_members() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 5);
        let leader = spawn_test_agent(&mut world, Role::Leader, Position::new(10.0, 10.0));
        let a = spawn_test_agent(&mut world, Role::Warrior, Position::new(11.0, 10.0));
        let b = spawn_test_agent(&mut world, Role::Tracker, Position::new(12.0, 10.0));

        let id = ctx.hunts.form(leader, PreyKind::Medium, 0);
        for member in [a, b] {
            assert!(ctx.hunts.add_member(id, member));
        }
        for member in [leader, a, b] {
            set_hunt_group(&mut world, member, Some(id));
        }
        ctx.hunts.begin(id);

        let population = Population::capture(&mut world);
        let outcome = resolve_hunt(&mut world, &mut ctx, id, &population).unwrap();
        assert!((outcome.success_rate - 0.6).abs() < 1e-6);

        for member in [leader, a, b] {
            let entity = entity_of(&world, member).unwrap();
            let record = world.get::<HuntRecord>(entity).unwrap();
            assert_eq!(record.group, None);
            assert_eq!(record.attempts, 1);
        }
        assert!(resolve_hunt(&mut world, &mut ctx, id, &population).is_none());
        assert_eq!(ctx.events.of_type("hunt_resolved").count(), 1);
    }

    #[test]
    fn test_successful_hunt_shares_meat() {
        let config = SimConfig {
            hunting: HuntingConfig {
                base_success: 0.9,
                min_success: 1.0,
                max_success: 1.0,
                ..HuntingConfig::default()
            },
            ..SimConfig::default()
        };
        let (mut world, mut ctx) = test_world(config, 11);
        let leader = spawn_test_agent(&mut world, Role::Leader, Position::new(10.0, 10.0));
        let member = spawn_test_agent(&mut world, Role::Forager, Position::new(12.0, 10.0));
        let entity = entity_of(&world, member).unwrap();
        world.get_mut::<Physiology>(entity).unwrap().hunger = 100.0;

        let id = ctx.hunts.form(leader, PreyKind::Medium, 0);
        ctx.hunts.add_member(id, member);
        ctx.hunts.begin(id);
        let population = Population::capture(&mut world);
        let outcome = resolve_hunt(&mut world, &mut ctx, id, &population).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.meat, 8.0);
        // half of the carcass went to the member
        assert!((ctx.meat.owned_amount(leader) - 4.0).abs() < 1e-6);
        assert!(world.get::<Physiology>(entity).unwrap().hunger < 100.0);
        assert_eq!(ctx.events.of_type("meat_shared").count(), 1);
        assert!(ctx.trust.get_trust(member, leader) > 0.0);
        assert!(ctx
            .boundaries
            .collective(&format!("hunt_group_{}", id.0))
            .is_some());
    }

    #[test]
    fn test_organize_hunt_recruits_and_starts() {
        let (mut world, mut ctx) = test_world(SimConfig::default(), 3);
        let leader = spawn_test_agent(&mut world, Role::Leader, Position::new(10.0, 10.0));
        for i in 0..4 {
            spawn_test_agent(&mut world, Role::Warrior, Position::new(12.0 + i as f32, 10.0));
        }
        let population = Population::capture(&mut world);
        let id = organize_hunt(&mut world, &mut ctx, leader, &population).unwrap();

        let group = ctx.hunts.get(id).unwrap();
        assert_eq!(group.status, HuntStatus::Hunting);
        assert_eq!(group.leader, leader);
        assert!(group.prey.required_hunters() <= group.size());
        for member in &group.members {
            let entity = entity_of(&world, *member).unwrap();
            assert_eq!(world.get::<HuntRecord>(entity).unwrap().group, Some(id));
        }

        // already leading: no second group
        let population = Population::capture(&mut world);
        assert!(organize_hunt(&mut world, &mut ctx, leader, &population).is_none());
    }
}

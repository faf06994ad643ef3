//! Trust Ledger
//!
//! Directed trust between agent pairs. Each named event kind settles trust
//! in one step, weighted by the emotional heat of the moment: intense
//! events overwrite what came before faster. Every event also leaves a
//! memory entry whose freshness decays over time; the trust value itself
//! never decays.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::components::{AgentId, Health, Physiology, SimClock};
use crate::config::{SimConfig, TrustConfig};

/// Constants for memory decay
pub mod memory_constants {
    /// Per-tick retention of memory strength before heat protection
    pub const BASE_RETENTION: f32 = 0.995;
    /// Extra retention per unit of emotional heat
    pub const HEAT_PROTECTION: f32 = 0.003;
}

/// Kinds of trust-settling events, each with a fixed (base trust, heat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustEventKind {
    LifeSavedCritical,
    CareDuringInjury,
    FoodInHunger,
    MeatShareStarving,
    HuntTogetherSuccess,
    HuntTogetherInjury,
    CasualFoodShare,
    HuntCooperation,
    AbandonInCrisis,
    FoodTheft,
}

impl TrustEventKind {
    /// (base_trust, event_heat)
    pub fn profile(self) -> (f32, f32) {
        match self {
            TrustEventKind::LifeSavedCritical => (0.9, 1.0),
            TrustEventKind::CareDuringInjury => (0.8, 0.9),
            TrustEventKind::FoodInHunger => (0.7, 0.8),
            TrustEventKind::MeatShareStarving => (0.75, 0.85),
            TrustEventKind::HuntTogetherSuccess => (0.6, 0.6),
            TrustEventKind::HuntTogetherInjury => (0.65, 0.7),
            TrustEventKind::CasualFoodShare => (0.55, 0.3),
            TrustEventKind::HuntCooperation => (0.52, 0.2),
            TrustEventKind::AbandonInCrisis => (0.1, 0.9),
            TrustEventKind::FoodTheft => (0.2, 0.6),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrustEventKind::LifeSavedCritical => "life_saved_critical",
            TrustEventKind::CareDuringInjury => "care_during_injury",
            TrustEventKind::FoodInHunger => "food_in_hunger",
            TrustEventKind::MeatShareStarving => "meat_share_starving",
            TrustEventKind::HuntTogetherSuccess => "hunt_together_success",
            TrustEventKind::HuntTogetherInjury => "hunt_together_injury",
            TrustEventKind::CasualFoodShare => "casual_food_share",
            TrustEventKind::HuntCooperation => "hunt_cooperation",
            TrustEventKind::AbandonInCrisis => "abandon_in_crisis",
            TrustEventKind::FoodTheft => "food_theft",
        }
    }
}

/// Situational flags that raise emotional heat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustContext {
    pub life_threatening: bool,
    pub desperate: bool,
    pub shared_danger: bool,
}

impl TrustContext {
    pub const NONE: TrustContext = TrustContext {
        life_threatening: false,
        desperate: false,
        shared_danger: false,
    };

    pub fn shared_danger() -> Self {
        Self {
            shared_danger: true,
            ..Self::NONE
        }
    }

    pub fn life_threatening() -> Self {
        Self {
            life_threatening: true,
            desperate: true,
            ..Self::NONE
        }
    }
}

/// Crisis state of the agent whose trust is being updated
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeatState {
    pub critically_injured: bool,
    pub hunger: f32,
    pub thirst: f32,
    pub fatigue: f32,
    pub recently_injured: bool,
}

impl HeatState {
    /// Read the crisis state off an agent's body and health
    pub fn of(body: &Physiology, health: Option<&Health>, tick: u64, config: &TrustConfig) -> Self {
        Self {
            critically_injured: health.is_some_and(Health::is_critical),
            hunger: body.hunger,
            thirst: body.thirst,
            fatigue: body.fatigue,
            recently_injured: health
                .is_some_and(|h| h.injured_within(tick, config.recent_injury_window)),
        }
    }

    /// Emotional heat in [0, 1]
    pub fn heat(&self, context: TrustContext, config: &TrustConfig) -> f32 {
        let mut heat = config.base_heat;
        if self.critically_injured {
            heat += config.injured_heat;
        } else if self.hunger > config.need_heat_threshold {
            heat += config.hunger_heat;
        } else if self.thirst > config.need_heat_threshold {
            heat += config.thirst_heat;
        } else if self.fatigue > 80.0 {
            heat += config.fatigue_heat;
        }
        if self.recently_injured {
            heat += config.recent_injury_heat;
        }
        if context.life_threatening {
            heat += config.life_threatening_heat;
        }
        if context.desperate {
            heat += config.desperate_heat;
        }
        if context.shared_danger {
            heat += config.shared_danger_heat;
        }
        heat.clamp(0.0, 1.0)
    }
}

/// A remembered trust event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMemory {
    pub tick: u64,
    pub event: String,
    pub emotional_heat: f32,
    pub trust_at_time: f32,
    pub memory_strength: f32,
}

/// Trust from one agent toward another
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustRecord {
    /// Settled trust; `None` until an event sets it
    pub trust: Option<f32>,
    pub memories: VecDeque<TrustMemory>,
}

impl TrustRecord {
    /// Heat-and-freshness-weighted average of remembered trust
    fn remembered_trust(&self) -> Option<f32> {
        let (weighted, total) = self.memories.iter().fold((0.0, 0.0), |(w, t), m| {
            let weight = m.memory_strength * m.emotional_heat;
            (w + m.trust_at_time * weight, t + weight)
        });
        if total > 0.0 {
            Some(weighted / total)
        } else {
            None
        }
    }
}

/// Resource: every directed trust record, keyed by (truster, trusted)
#[derive(Resource, Debug, Clone, Default)]
pub struct TrustLedger {
    records: BTreeMap<(AgentId, AgentId), TrustRecord>,
    config: TrustConfig,
}

impl TrustLedger {
    pub fn new(config: TrustConfig) -> Self {
        Self {
            records: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Apply a named event from `a`'s point of view. Returns the new trust.
    pub fn record_event(
        &mut self,
        a: AgentId,
        b: AgentId,
        kind: TrustEventKind,
        state: &HeatState,
        context: TrustContext,
        tick: u64,
    ) -> f32 {
        if a == b {
            return 1.0;
        }
        let heat = state.heat(context, &self.config);
        let (base, event_heat) = kind.profile();
        let multiplier = 0.5 + heat * event_heat * 0.5;
        let settled = base * multiplier;
        let current = self.get_trust(a, b);
        let weight_new = 0.7 + heat * 0.3;
        let trust = settled * weight_new + current * (1.0 - weight_new);
        self.store(a, b, kind.name(), trust, heat, tick)
    }

    fn store(
        &mut self,
        a: AgentId,
        b: AgentId,
        event: &str,
        trust: f32,
        heat: f32,
        tick: u64,
    ) -> f32 {
        let trust = if trust.is_finite() {
            trust.clamp(0.0, 1.0)
        } else {
            self.config.neutral_trust
        };
        let limit = self.config.history_limit.max(1);
        let record = self.records.entry((a, b)).or_default();
        record.trust = Some(trust);
        record.memories.push_back(TrustMemory {
            tick,
            event: event.to_string(),
            emotional_heat: heat,
            trust_at_time: trust,
            memory_strength: 1.0,
        });
        while record.memories.len() > limit {
            record.memories.pop_front();
        }
        tracing::trace!(truster = a.0, trusted = b.0, event, trust, heat, "trust updated");
        trust
    }

    /// Trust of `a` in `b`: the settled value, else remembered trust, else neutral
    pub fn get_trust(&self, a: AgentId, b: AgentId) -> f32 {
        if a == b {
            return 1.0;
        }
        match self.records.get(&(a, b)) {
            Some(TrustRecord {
                trust: Some(trust), ..
            }) => *trust,
            Some(record) => record
                .remembered_trust()
                .unwrap_or(self.config.neutral_trust),
            None => self.config.neutral_trust,
        }
    }

    pub fn record(&self, a: AgentId, b: AgentId) -> Option<&TrustRecord> {
        self.records.get(&(a, b))
    }

    #[cfg(test)]
    pub(crate) fn insert_record(&mut self, a: AgentId, b: AgentId, record: TrustRecord) {
        self.records.insert((a, b), record);
    }

    /// Everyone `a` trusts above `threshold`, in id order
    pub fn trusted_by(&self, a: AgentId, threshold: f32) -> Vec<AgentId> {
        self.records
            .range((a, AgentId(0))..=(a, AgentId(u32::MAX)))
            .filter(|(_, r)| r.trust.is_some_and(|t| t > threshold))
            .map(|((_, b), _)| *b)
            .collect()
    }

    /// Fade memory strength; prune entries that are both faded and old
    pub fn decay_memories(&mut self, tick: u64) {
        use memory_constants::*;

        let floor = self.config.prune_floor;
        let window = self.config.retention_window;
        for record in self.records.values_mut() {
            for memory in record.memories.iter_mut() {
                let retention = (BASE_RETENTION + memory.emotional_heat * HEAT_PROTECTION).min(1.0);
                memory.memory_strength *= retention;
            }
            record
                .memories
                .retain(|m| m.memory_strength >= floor || tick.saturating_sub(m.tick) < window);
        }
    }

    /// Drop every record involving an evicted agent
    pub fn forget(&mut self, id: AgentId) {
        self.records.retain(|(a, b), _| *a != id && *b != id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// System: Fade trust memories once per tick
pub fn decay_trust_memories(clock: Res<SimClock>, mut ledger: ResMut<TrustLedger>) {
    ledger.decay_memories(clock.current_tick);
}

/// Build a ledger from the loaded config
pub fn trust_ledger_from(config: &SimConfig) -> TrustLedger {
    TrustLedger::new(config.trust.clone())
}

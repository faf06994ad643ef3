//! Exploration Mode State Machine
//!
//! Agents are either settled or exploring. A leap into exploration needs
//! exploration pressure above a threshold that drops as unprocessed
//! pressure E builds up, plus a successful draw. Reversion is scored from
//! settlement coherence, time spent, fading pressure and discharged E.
//!
//! A life crisis always wins: it is evaluated first, as its own value,
//! before any other input is looked at.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};
use village_events::{ExplorationMode, ExplorationSnapshot, ReversionCause};

use super::coherence::{Coherence, CoherenceLedger};
use crate::components::{Physiology, SiteKind};
use crate::config::{ExplorationConfig, PhysiologyConfig};

/// Constants for the leap / reversion rules
pub mod exploration_constants {
    /// Boredom saturates after this many ticks without a discovery
    pub const BOREDOM_HORIZON: f32 = 150.0;
    pub const BOREDOM_WEIGHT: f32 = 0.6;
    pub const ALLY_INFO_WEIGHT: f32 = 0.3;
    pub const MAX_PRESSURE: f32 = 2.5;

    pub const LEAP_BASE_THRESHOLD: f32 = 0.8;
    pub const LEAP_CURIOSITY_WEIGHT: f32 = 0.3;
    pub const LEAP_ENERGY_WEIGHT: f32 = 0.2;
    pub const LEAP_MIN_THRESHOLD: f32 = 0.3;
    pub const LEAP_MAX_PROBABILITY: f32 = 0.9;

    pub const REVERSION_SCORE: f32 = 0.6;
    pub const REVERSION_STRONG_COHERENCE: f32 = 1.2;
    pub const FADED_PRESSURE: f32 = 0.2;
    pub const FADED_MIN_DURATION: u64 = 8;
    pub const FULL_DURATION: f32 = 15.0;
    pub const EXPLORATION_KAPPA_FLOOR: f32 = 0.05;
    pub const EXPLORATION_KAPPA_RETAIN: f32 = 0.9;

    /// Settlement memory
    pub const SETTLEMENT_HISTORY: usize = 20;
    pub const SETTLEMENT_RECENT: usize = 10;
    pub const SETTLEMENT_SATURATION: f32 = 15.0;

    /// Discovery reward
    pub const DISCOVERY_KAPPA_GAIN: f32 = 0.15;
    pub const DISCOVERY_ENERGY_GAIN: f32 = 0.5;
}

/// Acute danger from needs past their danger thresholds.
///
/// Kept as its own value on the `Exploration` component so the override
/// decision is explicit and inspectable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LifeCrisis {
    pub level: f32,
    pub risk_factors: u8,
}

impl LifeCrisis {
    const MAX_LEVEL: f32 = 4.0;

    pub fn assess(body: &Physiology, thresholds: &PhysiologyConfig) -> Self {
        let mut level = 0.0;
        if body.thirst > thresholds.thirst_danger {
            level += (body.thirst - thresholds.thirst_danger) / 40.0 * 2.0;
        }
        if body.hunger > thresholds.hunger_danger {
            level += (body.hunger - thresholds.hunger_danger) / 40.0 * 1.5;
        }
        if body.fatigue > thresholds.fatigue_danger {
            level += (body.fatigue - thresholds.fatigue_danger) / 20.0;
        }

        let risk_factors = [body.thirst > 120.0, body.hunger > 120.0, body.fatigue > 70.0]
            .iter()
            .filter(|r| **r)
            .count() as u8;
        if risk_factors >= 2 {
            level += risk_factors as f32 * 0.5;
        }

        Self {
            level: level.min(Self::MAX_LEVEL),
            risk_factors,
        }
    }

    pub fn forces_settle(&self, config: &ExplorationConfig) -> bool {
        self.level > config.crisis_exit
    }

    pub fn blocks_leap(&self, config: &ExplorationConfig) -> bool {
        self.level > config.crisis_block
    }
}

/// Known vs existing sites of one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub known: usize,
    pub total: usize,
}

impl Coverage {
    pub fn unknown_ratio(&self) -> f32 {
        if self.total == 0 || self.known >= self.total {
            return 0.0;
        }
        1.0 - self.known as f32 / self.total as f32
    }
}

/// Everything the state machine reads for one update
#[derive(Debug, Clone)]
pub struct ExplorationInputs {
    pub tick: u64,
    pub body: Physiology,
    pub curiosity: f32,
    pub coverage: BTreeMap<SiteKind, Coverage>,
    /// Allies within reach know fewer sites than this agent
    pub allies_need_info: bool,
    /// Relationships with trust above 0.3
    pub strong_relationships: usize,
}

impl ExplorationInputs {
    fn knowledge_ratio(&self) -> f32 {
        let (known, total) = self
            .coverage
            .values()
            .fold((0, 0), |(k, t), c| (k + c.known.min(c.total), t + c.total));
        if total == 0 {
            return 0.0;
        }
        known as f32 / total as f32
    }
}

/// A mode change produced by `Exploration::update`
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Leap {
        pressure: f32,
        intensity: f32,
        energy_after: f32,
    },
    Reversion {
        cause: ReversionCause,
        duration: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SettlementMemory {
    resource_stability: VecDeque<f32>,
    social_stability: VecDeque<f32>,
    satisfaction: VecDeque<f32>,
}

impl SettlementMemory {
    fn record(&mut self, resource: f32, social: f32, satisfaction: f32) {
        for (series, value) in [
            (&mut self.resource_stability, resource),
            (&mut self.social_stability, social),
            (&mut self.satisfaction, satisfaction),
        ] {
            series.push_back(value);
            while series.len() > exploration_constants::SETTLEMENT_HISTORY {
                series.pop_front();
            }
        }
    }

    fn recent_mean(series: &VecDeque<f32>) -> f32 {
        let skip = series.len().saturating_sub(exploration_constants::SETTLEMENT_RECENT);
        let recent: Vec<f32> = series.iter().skip(skip).copied().collect();
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().sum::<f32>() / recent.len() as f32
    }

    /// Experience-driven part of settlement coherence
    fn weight(&self) -> f32 {
        if self.resource_stability.is_empty() {
            return 0.0;
        }
        let coherence = Self::recent_mean(&self.resource_stability) * 0.4
            + Self::recent_mean(&self.social_stability) * 0.3
            + Self::recent_mean(&self.satisfaction) * 0.3;
        let saturation = (self.resource_stability.len() as f32
            / exploration_constants::SETTLEMENT_SATURATION)
            .min(1.0);
        saturation * coherence
    }
}

/// Component: exploration mode, intensity and the last crisis assessment
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Exploration {
    pub mode: ExplorationMode,
    pub intensity: f32,
    pub started_at: u64,
    pub last_discovery: u64,
    pub crisis: LifeCrisis,
    pub last_pressure: f32,
    settlement: SettlementMemory,
}

impl Default for Exploration {
    fn default() -> Self {
        Self::new()
    }
}

impl Exploration {
    pub fn new() -> Self {
        Self {
            mode: ExplorationMode::Settled,
            intensity: 1.0,
            started_at: 0,
            last_discovery: 0,
            crisis: LifeCrisis::default(),
            last_pressure: 0.0,
            settlement: SettlementMemory::default(),
        }
    }

    pub fn is_exploring(&self) -> bool {
        self.mode == ExplorationMode::Exploring
    }

    pub fn duration(&self, tick: u64) -> u64 {
        if self.is_exploring() {
            tick.saturating_sub(self.started_at)
        } else {
            0
        }
    }

    pub fn snapshot(&self, tick: u64, energy: f32) -> ExplorationSnapshot {
        ExplorationSnapshot {
            mode: self.mode,
            intensity: self.intensity,
            duration: self.duration(tick).min(u32::MAX as u64) as u32,
            life_crisis: self.crisis.level,
            energy,
        }
    }

    /// Put the agent into exploration directly (used by setup and tests)
    pub fn enter(&mut self, tick: u64, intensity: f32) {
        self.mode = ExplorationMode::Exploring;
        self.started_at = tick;
        self.intensity = intensity.max(1.0);
    }

    /// Pressure to explore: boredom since the last discovery, unknown
    /// sites, and allies who could use this agent's knowledge.
    pub fn pressure(&self, inputs: &ExplorationInputs) -> f32 {
        use exploration_constants::*;

        let since = inputs.tick.saturating_sub(self.last_discovery) as f32;
        let boredom = (since / BOREDOM_HORIZON).min(1.0);
        let mut pressure = boredom * BOREDOM_WEIGHT;

        let weight = |kind: SiteKind| match kind {
            SiteKind::Cave => 0.25,
            SiteKind::Water => 0.25,
            SiteKind::Berries => 0.3,
            SiteKind::HuntingGround => 0.2,
        };
        pressure += inputs
            .coverage
            .iter()
            .map(|(kind, coverage)| coverage.unknown_ratio() * weight(*kind))
            .sum::<f32>();

        if self.is_exploring() && inputs.allies_need_info {
            pressure += ALLY_INFO_WEIGHT * self.intensity;
        }
        pressure.min(MAX_PRESSURE)
    }

    /// Advance the state machine by one turn
    pub fn update(
        &mut self,
        inputs: &ExplorationInputs,
        ledger: &mut CoherenceLedger,
        physiology: &PhysiologyConfig,
        config: &ExplorationConfig,
        rng: &mut impl Rng,
    ) -> Option<Transition> {
        self.crisis = LifeCrisis::assess(&inputs.body, physiology);

        if self.is_exploring() {
            let duration = self.duration(inputs.tick);
            if self.crisis.forces_settle(config) {
                self.settle(ledger);
                return Some(Transition::Reversion {
                    cause: ReversionCause::LifeCrisis,
                    duration,
                });
            }
            let pressure = self.pressure(inputs);
            self.last_pressure = pressure;
            return self
                .consider_reversion(inputs, pressure, duration, ledger)
                .map(|cause| Transition::Reversion { cause, duration });
        }

        if self.crisis.blocks_leap(config) {
            return None;
        }
        let pressure = self.pressure(inputs);
        self.last_pressure = pressure;
        self.consider_leap(inputs, pressure, ledger, config, rng)
    }

    fn consider_leap(
        &mut self,
        inputs: &ExplorationInputs,
        pressure: f32,
        ledger: &mut CoherenceLedger,
        config: &ExplorationConfig,
        rng: &mut impl Rng,
    ) -> Option<Transition> {
        use exploration_constants::*;

        let energy = ledger.energy();
        let threshold = (LEAP_BASE_THRESHOLD
            + (1.0 - inputs.curiosity) * LEAP_CURIOSITY_WEIGHT
            - energy * LEAP_ENERGY_WEIGHT)
            .max(LEAP_MIN_THRESHOLD);
        if pressure <= threshold {
            return None;
        }

        let experience = ledger.kappa(Coherence::Exploration);
        let probability = ((pressure + energy * config.energy_weight) / 2.0 * (0.5 + experience))
            .min(LEAP_MAX_PROBABILITY);
        if rng.gen::<f32>() >= probability {
            return None;
        }

        ledger.drain_energy(pressure * config.leap_drain);
        self.enter(inputs.tick, 1.0 + pressure * 0.5);
        Some(Transition::Leap {
            pressure,
            intensity: self.intensity,
            energy_after: ledger.energy(),
        })
    }

    fn consider_reversion(
        &mut self,
        inputs: &ExplorationInputs,
        pressure: f32,
        duration: u64,
        ledger: &mut CoherenceLedger,
    ) -> Option<ReversionCause> {
        use exploration_constants::*;

        let stability = resource_stability(inputs);
        let coherence = self.settlement_coherence(pressure, stability);
        let threshold = 0.7 - inputs.curiosity * 0.2;

        let coherence_factor = (coherence / threshold).min(1.0);
        let duration_factor = (duration as f32 / FULL_DURATION).min(1.0);
        let pressure_factor = ((0.6 - pressure) / 0.6).max(0.0);
        let energy_factor = ((3.0 - ledger.energy()) / 3.0).max(0.0);
        let score = coherence_factor * 0.4
            + duration_factor * 0.2
            + pressure_factor * 0.3
            + energy_factor * 0.1;

        let cause = if score > REVERSION_SCORE {
            ReversionCause::SettlementScore
        } else if coherence >= threshold * REVERSION_STRONG_COHERENCE {
            ReversionCause::SettlementCoherence
        } else if pressure < FADED_PRESSURE && duration > FADED_MIN_DURATION {
            ReversionCause::PressureFaded
        } else {
            return None;
        };

        let social = (inputs.strong_relationships as f32 / 5.0).min(1.0);
        let satisfaction = (duration as f32 / 100.0).min(1.0) * (1.0 - pressure).max(0.0);
        self.settlement.record(stability, social, satisfaction);
        self.settle(ledger);
        Some(cause)
    }

    /// Base settling tendency blended with remembered settlements
    pub fn settlement_coherence(&self, pressure: f32, stability: f32) -> f32 {
        let base = stability * (1.0 - pressure.min(1.0));
        base * 0.4 + self.settlement.weight() * 0.6
    }

    fn settle(&mut self, ledger: &mut CoherenceLedger) {
        use exploration_constants::*;

        self.mode = ExplorationMode::Settled;
        self.intensity = 1.0;
        let kappa = ledger.kappa(Coherence::Exploration);
        ledger.set_kappa(
            Coherence::Exploration,
            (kappa * EXPLORATION_KAPPA_RETAIN).max(EXPLORATION_KAPPA_FLOOR),
        );
    }

    /// Reward for finding a new site: κ_exploration and E both rise.
    /// Returns the pleasure value.
    pub fn record_discovery(
        &mut self,
        tick: u64,
        kind: SiteKind,
        pressure: f32,
        ledger: &mut CoherenceLedger,
        e_max: f32,
    ) -> f32 {
        use exploration_constants::*;

        let value = match kind {
            SiteKind::Cave => 0.9,
            SiteKind::Water => 0.8,
            SiteKind::Berries => 1.0,
            SiteKind::HuntingGround => 0.85,
        };
        let multiplier = if self.is_exploring() { self.intensity } else { 1.0 };
        let pleasure = pressure * value * multiplier;
        ledger.adjust_kappa(Coherence::Exploration, DISCOVERY_KAPPA_GAIN);
        ledger.add_energy(pleasure * DISCOVERY_ENERGY_GAIN, e_max);
        self.last_discovery = tick;
        pleasure
    }
}

/// How secure the agent's basic needs and knowledge are, 0..1
pub fn resource_stability(inputs: &ExplorationInputs) -> f32 {
    let comfort = |level: f32| ((70.0 - level) / 70.0).max(0.0);
    let basic = (comfort(inputs.body.hunger)
        + comfort(inputs.body.thirst)
        + comfort(inputs.body.fatigue))
        / 3.0;
    (basic * 0.6 + inputs.knowledge_ratio() * 0.4).min(1.0)
}

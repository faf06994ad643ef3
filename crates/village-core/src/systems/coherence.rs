//! Coherence Ledger and Need-Pressure Evaluator
//!
//! Each agent carries a coherence map κ (how entrenched its response to a
//! need has become) and a scalar E of unprocessed pressure. Every turn the
//! ledger is reinforced by the needs that currently exceed their soft
//! thresholds, decays toward per-category floors, and turns the
//! physiological state into a pressure value per need category.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use village_events::NeedCategory;

use crate::config::CoherenceConfig;

/// Constants for κ reinforcement, decay and pressure saturation
pub mod kappa_constants {
    pub const THIRST_SOFT_THRESHOLD: f32 = 60.0;
    pub const THIRST_INTENSITY_SCALE: f32 = 80.0;
    pub const THIRST_SEVERE: f32 = 85.0;
    pub const THIRST_RATE: (f32, f32) = (0.08, 0.12);

    pub const HUNGER_SOFT_THRESHOLD: f32 = 60.0;
    pub const HUNGER_INTENSITY_SCALE: f32 = 90.0;
    pub const HUNGER_SEVERE: f32 = 95.0;
    pub const HUNGER_RATE: (f32, f32) = (0.06, 0.10);

    pub const FATIGUE_SOFT_THRESHOLD: f32 = 70.0;
    pub const FATIGUE_INTENSITY_SCALE: f32 = 100.0;
    pub const FATIGUE_SEVERE: f32 = 110.0;
    pub const FATIGUE_RATE: (f32, f32) = (0.04, 0.06);

    /// Failures push inertia up harder than successes pull it down
    pub const FAILURE_INFLUENCE: f32 = 0.15;
    pub const SUCCESS_INFLUENCE: f32 = 0.05;

    /// κ below this produces no pressure for a survival need
    pub const ACTIVATION_FLOOR: f32 = 0.3;

    /// Urgency saturation: level / divisor, capped
    pub const THIRST_SATURATION: (f32, f32) = (60.0, 2.0);
    pub const HUNGER_SATURATION: (f32, f32) = (70.0, 2.0);
    pub const FATIGUE_SATURATION: (f32, f32) = (80.0, 2.0);
    pub const HUNT_SATURATION: (f32, f32) = (50.0, 2.5);

    /// Territory κ follows the coherence factor at this rate
    pub const TERRITORY_DRIFT: f32 = 0.02;

    /// Hunting κ reacts to the hunter's track record
    pub const HUNT_GOOD_RATE: f32 = 0.6;
    pub const HUNT_POOR_RATE: f32 = 0.3;
    pub const HUNT_REINFORCE: f32 = 0.02;
    pub const HUNT_WEAKEN: f32 = 0.01;
    pub const HUNT_CEILING: f32 = 0.9;

    /// Stimulus level that E starts accumulating above
    pub const ENERGY_STIMULUS_THRESHOLD: f32 = 0.5;
}

/// Categories tracked in the coherence map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coherence {
    Thirst,
    Hunger,
    Fatigue,
    Territory,
    Hunting,
    GroupHunting,
    Exploration,
    BoundaryFormation,
}

impl Coherence {
    pub fn all() -> &'static [Coherence] {
        &[
            Coherence::Thirst,
            Coherence::Hunger,
            Coherence::Fatigue,
            Coherence::Territory,
            Coherence::Hunting,
            Coherence::GroupHunting,
            Coherence::Exploration,
            Coherence::BoundaryFormation,
        ]
    }

    /// Lower bound of κ for this category
    pub fn floor(self) -> f32 {
        match self {
            Coherence::Thirst | Coherence::Hunger | Coherence::Fatigue => 0.3,
            Coherence::Hunting => 0.25,
            Coherence::Territory | Coherence::GroupHunting | Coherence::BoundaryFormation => 0.1,
            Coherence::Exploration => 0.05,
        }
    }

    pub fn initial(self) -> f32 {
        match self {
            Coherence::Thirst => 0.7,
            Coherence::Hunger => 0.6,
            Coherence::Fatigue => 0.4,
            Coherence::Territory => 0.5,
            Coherence::Hunting => 0.7,
            Coherence::GroupHunting => 0.3,
            Coherence::Exploration => 0.5,
            Coherence::BoundaryFormation => 0.1,
        }
    }

    /// Per-tick decay. Strong habits decay at the slower rate.
    pub fn decay_step(self, kappa: f32) -> f32 {
        match self {
            Coherence::Thirst | Coherence::Hunger | Coherence::Fatigue => {
                if kappa > 0.8 {
                    0.003
                } else {
                    0.006
                }
            }
            Coherence::Territory => 0.0,
            _ => {
                if kappa > 0.5 {
                    0.001
                } else {
                    0.002
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OutcomeTally {
    successes: u32,
    failures: u32,
}

/// One turn's worth of inputs to the evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct NeedSamples {
    pub hunger: f32,
    pub thirst: f32,
    pub fatigue: f32,
    /// 0.5 without territory, up to 1.5 deep inside one
    pub territory_factor: f32,
    pub hunt_attempts: u32,
    pub hunt_success_rate: f32,
    pub hunt_skill: f32,
    pub environmental_pressure: f32,
}

impl Default for NeedSamples {
    fn default() -> Self {
        Self {
            hunger: 0.0,
            thirst: 0.0,
            fatigue: 0.0,
            territory_factor: 1.0,
            hunt_attempts: 0,
            hunt_success_rate: 0.0,
            hunt_skill: 0.3,
            environmental_pressure: 0.0,
        }
    }
}

/// Component: per-agent κ map, energy E and outcome history
#[derive(Component, Debug, Clone, PartialEq)]
pub struct CoherenceLedger {
    kappa: BTreeMap<Coherence, f32>,
    energy: f32,
    outcomes: BTreeMap<NeedCategory, OutcomeTally>,
}

impl Default for CoherenceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CoherenceLedger {
    pub fn new() -> Self {
        Self {
            kappa: Coherence::all().iter().map(|c| (*c, c.initial())).collect(),
            energy: 0.0,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn kappa(&self, category: Coherence) -> f32 {
        self.kappa
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.initial())
    }

    /// Set κ, clamped to [floor, 1]
    pub fn set_kappa(&mut self, category: Coherence, value: f32) {
        let value = if value.is_finite() { value } else { category.floor() };
        self.kappa
            .insert(category, value.clamp(category.floor(), 1.0));
    }

    pub fn adjust_kappa(&mut self, category: Coherence, delta: f32) {
        self.set_kappa(category, self.kappa(category) + delta);
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Add (or with a negative amount, drain) E within [0, max]
    pub fn add_energy(&mut self, amount: f32, max: f32) {
        self.energy = (self.energy + amount).clamp(0.0, max);
    }

    /// Drain E, never below zero
    pub fn drain_energy(&mut self, amount: f32) {
        self.energy = (self.energy - amount.max(0.0)).max(0.0);
    }

    pub fn record_outcome(&mut self, need: NeedCategory, success: bool) {
        let tally = self.outcomes.entry(need).or_default();
        if success {
            tally.successes += 1;
        } else {
            tally.failures += 1;
        }
    }

    pub fn outcome_count(&self, need: NeedCategory) -> u32 {
        self.outcomes
            .get(&need)
            .map_or(0, |t| t.successes + t.failures)
    }

    /// History-driven adjustment to the reinforcement rate.
    ///
    /// Zero samples give zero influence. Weight saturates at `saturation`
    /// samples.
    pub fn memory_influence(&self, need: NeedCategory, saturation: f32) -> f32 {
        let Some(tally) = self.outcomes.get(&need) else {
            return 0.0;
        };
        let total = tally.successes + tally.failures;
        if total == 0 {
            return 0.0;
        }
        let total = total as f32;
        let failure_ratio = tally.failures as f32 / total;
        let success_ratio = tally.successes as f32 / total;
        let weight = if saturation > 0.0 {
            (total / saturation).min(1.0)
        } else {
            1.0
        };
        (failure_ratio * kappa_constants::FAILURE_INFLUENCE
            - success_ratio * kappa_constants::SUCCESS_INFLUENCE)
            * weight
    }

    /// Reinforce, decay and evaluate. Returns pressure per need category,
    /// each in [0, 1].
    pub fn update(
        &mut self,
        samples: &NeedSamples,
        config: &CoherenceConfig,
    ) -> BTreeMap<NeedCategory, f32> {
        use kappa_constants::*;

        self.reinforce(
            Coherence::Thirst,
            NeedCategory::Thirst,
            samples.thirst,
            (THIRST_SOFT_THRESHOLD, THIRST_INTENSITY_SCALE, THIRST_SEVERE),
            THIRST_RATE,
            config.memory_saturation,
        );
        self.reinforce(
            Coherence::Hunger,
            NeedCategory::Hunger,
            samples.hunger,
            (HUNGER_SOFT_THRESHOLD, HUNGER_INTENSITY_SCALE, HUNGER_SEVERE),
            HUNGER_RATE,
            config.memory_saturation,
        );
        self.reinforce(
            Coherence::Fatigue,
            NeedCategory::Fatigue,
            samples.fatigue,
            (FATIGUE_SOFT_THRESHOLD, FATIGUE_INTENSITY_SCALE, FATIGUE_SEVERE),
            FATIGUE_RATE,
            config.memory_saturation,
        );

        if samples.hunt_attempts > 0 {
            let hunting = self.kappa(Coherence::Hunting);
            if samples.hunt_success_rate > HUNT_GOOD_RATE {
                let raised = (hunting + HUNT_REINFORCE).min(HUNT_CEILING.max(hunting));
                self.set_kappa(Coherence::Hunting, raised);
            } else if samples.hunt_success_rate < HUNT_POOR_RATE {
                self.adjust_kappa(Coherence::Hunting, -HUNT_WEAKEN);
            }
        }

        self.adjust_kappa(
            Coherence::Territory,
            (samples.territory_factor - 1.0) * TERRITORY_DRIFT,
        );

        self.decay();

        let pressures = self.evaluate(samples);
        self.accumulate_energy(samples.environmental_pressure, &pressures, config);
        pressures
    }

    fn reinforce(
        &mut self,
        category: Coherence,
        need: NeedCategory,
        level: f32,
        (soft, scale, severe): (f32, f32, f32),
        (base, severe_base): (f32, f32),
        saturation: f32,
    ) {
        if level <= soft {
            return;
        }
        let intensity = (level / scale).min(1.0);
        let rate = if level > severe { severe_base } else { base };
        let boost = intensity * (rate + self.memory_influence(need, saturation));
        self.adjust_kappa(category, boost);
    }

    /// Decay every category toward its floor
    pub fn decay(&mut self) {
        for category in Coherence::all() {
            let kappa = self.kappa(*category);
            let step = category.decay_step(kappa);
            if step > 0.0 {
                self.set_kappa(*category, (kappa - step).max(category.floor()));
            }
        }
    }

    fn evaluate(&self, samples: &NeedSamples) -> BTreeMap<NeedCategory, f32> {
        use kappa_constants::*;

        let gated = |category: Coherence, level: f32, (divisor, cap): (f32, f32)| -> f32 {
            let kappa = self.kappa(category);
            if kappa <= ACTIVATION_FLOOR {
                return 0.0;
            }
            (kappa * (level / divisor).min(cap)).clamp(0.0, 1.0)
        };

        let mut pressures = BTreeMap::new();
        pressures.insert(
            NeedCategory::Thirst,
            gated(Coherence::Thirst, samples.thirst, THIRST_SATURATION),
        );
        pressures.insert(
            NeedCategory::Hunger,
            gated(Coherence::Hunger, samples.hunger, HUNGER_SATURATION),
        );
        pressures.insert(
            NeedCategory::Fatigue,
            gated(Coherence::Fatigue, samples.fatigue, FATIGUE_SATURATION),
        );

        let territory =
            self.kappa(Coherence::Territory) * (1.0 - samples.territory_factor).max(0.0);
        pressures.insert(NeedCategory::Territory, territory.clamp(0.0, 1.0));

        let (divisor, cap) = HUNT_SATURATION;
        let hunting = self.kappa(Coherence::Hunting)
            * (samples.hunger / divisor).min(cap)
            * samples.hunt_skill.max(0.5);
        pressures.insert(NeedCategory::Hunting, hunting.clamp(0.0, 1.0));

        pressures
    }

    /// dE = dt * (α * excess stimulus - β * E)
    fn accumulate_energy(
        &mut self,
        environmental_pressure: f32,
        pressures: &BTreeMap<NeedCategory, f32>,
        config: &CoherenceConfig,
    ) {
        let survival: f32 = [NeedCategory::Thirst, NeedCategory::Hunger, NeedCategory::Fatigue]
            .iter()
            .map(|n| pressures.get(n).copied().unwrap_or(0.0))
            .sum::<f32>()
            / 3.0;
        let stimulus = environmental_pressure + survival;
        let excess = (stimulus - kappa_constants::ENERGY_STIMULUS_THRESHOLD).max(0.0);
        let delta = config.energy_dt * (config.alpha_e * excess - config.beta_e * self.energy);
        self.add_energy(delta, config.e_max);
    }
}

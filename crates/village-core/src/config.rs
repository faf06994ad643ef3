//! Configuration System
//!
//! Loads tuning parameters from `village.toml` so the decision loop can be
//! adjusted without recompiling. Every section is optional; missing keys
//! take the defaults below.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default tuning file path
pub const DEFAULT_CONFIG_PATH: &str = "village.toml";

/// Top-level configuration structure
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub simulation: SimulationConfig,
    pub physiology: PhysiologyConfig,
    pub coherence: CoherenceConfig,
    pub exploration: ExplorationConfig,
    pub trust: TrustConfig,
    pub boundary: BoundaryConfig,
    pub hunting: HuntingConfig,
    pub care: CareConfig,
    pub territory: TerritoryConfig,
    pub environment: EnvironmentConfig,
}

/// Simulation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub default_ticks: u64,
    pub agent_count: usize,
    pub world_size: f32,
    pub season_length: u64,
    /// Radius used by the perception pass to fill `Nearby`
    pub perception_radius: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_ticks: 500,
            agent_count: 12,
            world_size: 100.0,
            season_length: 50,
            perception_radius: 15.0,
        }
    }
}

/// Needs drift, death and relief amounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysiologyConfig {
    pub hunger_rate: f32,
    pub thirst_rate: f32,
    pub fatigue_rate: f32,
    pub thirst_death: f32,
    pub hunger_death: f32,
    pub hunger_danger: f32,
    pub thirst_danger: f32,
    pub fatigue_danger: f32,
    pub drink_relief: f32,
    pub forage_relief: f32,
    pub rest_relief_sheltered: f32,
    pub rest_relief_open: f32,
    /// Hunger removed per unit of fresh meat eaten, before the nutrition constant
    pub meat_hunger_per_unit: f32,
    pub meal_size: f32,
    pub move_speed: f32,
    pub reach_distance: f32,
}

impl Default for PhysiologyConfig {
    fn default() -> Self {
        Self {
            hunger_rate: 1.5,
            thirst_rate: 2.0,
            fatigue_rate: 1.0,
            thirst_death: 200.0,
            hunger_death: 240.0,
            hunger_danger: 160.0,
            thirst_danger: 140.0,
            fatigue_danger: 80.0,
            drink_relief: 45.0,
            forage_relief: 40.0,
            rest_relief_sheltered: 25.0,
            rest_relief_open: 12.0,
            meat_hunger_per_unit: 10.0,
            meal_size: 4.0,
            move_speed: 3.0,
            reach_distance: 1.5,
        }
    }
}

/// Unprocessed-pressure (E) dynamics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceConfig {
    /// Accumulation coefficient
    pub alpha_e: f32,
    /// Natural dissipation coefficient
    pub beta_e: f32,
    pub e_max: f32,
    /// Integration step applied per tick
    pub energy_dt: f32,
    /// Outcome samples at which memory influence reaches full weight
    pub memory_saturation: f32,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            alpha_e: 0.6,
            beta_e: 0.15,
            e_max: 5.0,
            energy_dt: 0.1,
            memory_saturation: 10.0,
        }
    }
}

/// Leap / reversion tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Life-crisis level that forces an exploring agent home
    pub crisis_exit: f32,
    /// Life-crisis level that blocks a leap
    pub crisis_block: f32,
    /// Weight of E in the leap probability
    pub energy_weight: f32,
    /// Fraction of pressure drained from E on a leap
    pub leap_drain: f32,
    pub discovery_radius: f32,
    pub wander_distance: f32,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            crisis_exit: 1.5,
            crisis_block: 1.0,
            energy_weight: 0.3,
            leap_drain: 0.3,
            discovery_radius: 10.0,
            wander_distance: 12.0,
        }
    }
}

/// Trust ledger tuning, including the emotional-heat constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub neutral_trust: f32,
    pub history_limit: usize,
    /// Memory strength below which an old entry is pruned
    pub prune_floor: f32,
    /// Entries younger than this many ticks are never pruned
    pub retention_window: u64,
    pub base_heat: f32,
    pub injured_heat: f32,
    pub hunger_heat: f32,
    pub thirst_heat: f32,
    pub fatigue_heat: f32,
    pub recent_injury_heat: f32,
    pub recent_injury_window: u64,
    pub life_threatening_heat: f32,
    pub desperate_heat: f32,
    pub shared_danger_heat: f32,
    /// Need level above which hunger/thirst adds heat
    pub need_heat_threshold: f32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            neutral_trust: 0.5,
            history_limit: 15,
            prune_floor: 0.05,
            retention_window: 200,
            base_heat: 0.3,
            injured_heat: 0.7,
            hunger_heat: 0.4,
            thirst_heat: 0.4,
            fatigue_heat: 0.2,
            recent_injury_heat: 0.3,
            recent_injury_window: 20,
            life_threatening_heat: 0.5,
            desperate_heat: 0.4,
            shared_danger_heat: 0.3,
            need_heat_threshold: 150.0,
        }
    }
}

/// Subjective boundary tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub expansion_threshold: f32,
    pub contraction_threshold: f32,
    /// Valence above which an experience expands the boundary
    pub positive_valence: f32,
    pub shared_context_radius: f32,
    pub protector_radius: f32,
    pub protector_min_strength: f32,
    /// Raw strength that counts as "inside" even without set membership
    pub within_strength: f32,
    pub cooperation_bonus: f32,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            expansion_threshold: 0.4,
            contraction_threshold: 0.2,
            positive_valence: 0.3,
            shared_context_radius: 15.0,
            protector_radius: 20.0,
            protector_min_strength: 0.4,
            within_strength: 0.3,
            cooperation_bonus: 0.2,
        }
    }
}

/// Which future-motivation strategy the hunt score uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotivationKind {
    #[default]
    Simple,
    Forecasted,
}

/// Hunting and meat tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntingConfig {
    pub motivation: MotivationKind,
    pub base_success: f32,
    pub per_member_bonus: f32,
    pub max_member_bonus: f32,
    pub min_success: f32,
    pub max_success: f32,
    pub fatigue_cost: f32,
    pub max_recruits: usize,
    pub recruit_radius: f32,
    /// Candidates at or above this fatigue are too exhausted to join
    pub exhaustion_limit: f32,
    pub critical_injury_chance: f32,
    pub meat_decay_rate: f32,
    pub nutrition_value: f32,
    /// Failure adds this much E, split across the group
    pub failure_pressure: f32,
}

impl Default for HuntingConfig {
    fn default() -> Self {
        Self {
            motivation: MotivationKind::Simple,
            base_success: 0.4,
            per_member_bonus: 0.15,
            max_member_bonus: 0.4,
            min_success: 0.1,
            max_success: 0.9,
            fatigue_cost: 15.0,
            max_recruits: 4,
            recruit_radius: 60.0,
            exhaustion_limit: 151.0,
            critical_injury_chance: 0.05,
            meat_decay_rate: 0.15,
            nutrition_value: 0.8,
            failure_pressure: 0.4,
        }
    }
}

/// Injury and care tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CareConfig {
    pub effectiveness: f32,
    pub min_critical_duration: u32,
    pub max_critical_duration: u32,
    pub minor_duration: u32,
    pub care_radius: f32,
}

impl Default for CareConfig {
    fn default() -> Self {
        Self {
            effectiveness: 0.3,
            min_critical_duration: 50,
            max_critical_duration: 120,
            minor_duration: 10,
            care_radius: 6.0,
        }
    }
}

/// Territory claim tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryConfig {
    pub claim_threshold: f32,
    /// Rests at one cave needed for full safety feeling
    pub rests_for_safety: u32,
    pub base_radius: f32,
    pub merge_trust: f32,
    pub overlap_buffer: f32,
    pub invite_trust: f32,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            claim_threshold: 0.6,
            rests_for_safety: 3,
            base_radius: 8.0,
            merge_trust: 0.6,
            overlap_buffer: 3.0,
            invite_trust: 0.6,
        }
    }
}

/// Site counts for the default environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub water_sites: usize,
    pub berry_sites: usize,
    pub cave_sites: usize,
    pub hunting_grounds: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            water_sites: 4,
            berry_sites: 8,
            cave_sites: 3,
            hunting_grounds: 3,
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from the default path, or use defaults if not found
    pub fn load_or_default() -> Self {
        Self::load(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            tracing::warn!("could not load {}: {}; using defaults", DEFAULT_CONFIG_PATH, e);
            Self::default()
        })
    }

    /// Serialize the configuration back to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

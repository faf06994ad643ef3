//! Report Types
//!
//! Serializable views of one agent turn and of the population's boundaries.
//! Agents are referenced by their numeric id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Need categories that produce a pressure value each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedCategory {
    Thirst,
    Hunger,
    Fatigue,
    Territory,
    Hunting,
}

impl NeedCategory {
    pub fn all() -> &'static [NeedCategory] {
        &[
            NeedCategory::Thirst,
            NeedCategory::Hunger,
            NeedCategory::Fatigue,
            NeedCategory::Territory,
            NeedCategory::Hunting,
        ]
    }
}

/// Actions an agent can take in its turn.
///
/// Declaration order is the tie-break order used when two actions score
/// equally: water first, exploration last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SeekWater,
    SeekFood,
    ReturnToTerritory,
    StrengthenTerritory,
    Hunt,
    Rest,
    CareForInjured,
    Explore,
}

impl ActionKind {
    /// Position in the fixed tie-break order (lower wins).
    pub fn tie_rank(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationMode {
    #[default]
    Settled,
    Exploring,
}

/// Exploration state as seen after a turn's update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSnapshot {
    pub mode: ExplorationMode,
    pub intensity: f32,
    /// Ticks spent in the current exploring episode (0 while settled).
    pub duration: u32,
    pub life_crisis: f32,
    pub energy: f32,
}

impl ExplorationSnapshot {
    pub fn is_exploring(&self) -> bool {
        self.mode == ExplorationMode::Exploring
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritorySnapshot {
    pub territory: Option<u32>,
    pub coherence_factor: f32,
    pub inside: bool,
    pub members: usize,
}

/// Result of one agent's turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub agent: u32,
    pub tick: u64,
    pub chosen_action: ActionKind,
    pub category_pressures: BTreeMap<NeedCategory, f32>,
    pub exploration_state: ExplorationSnapshot,
    pub territory_state: TerritorySnapshot,
}

/// Per-agent boundary summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualBoundarySummary {
    pub inner_people: usize,
    pub inner_places: usize,
    pub inner_resources: usize,
    pub inner_activities: usize,
    /// Fraction of tracked objects whose strength magnitude exceeds 0.5.
    pub clarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectiveSummary {
    pub key: String,
    pub members: Vec<u32>,
    pub cohesion: f32,
    pub shared_experiences: usize,
}

/// Population-wide boundary analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundaryAnalysis {
    pub individual_boundaries: BTreeMap<u32, IndividualBoundarySummary>,
    pub collective_boundaries: Vec<CollectiveSummary>,
    pub violation_count: usize,
    /// Violations that ended in aggressive defense.
    pub external_conflicts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tie_order() {
        assert!(ActionKind::SeekWater.tie_rank() < ActionKind::SeekFood.tie_rank());
        assert!(ActionKind::SeekFood.tie_rank() < ActionKind::ReturnToTerritory.tie_rank());
        assert!(
            ActionKind::ReturnToTerritory.tie_rank() < ActionKind::StrengthenTerritory.tie_rank()
        );
        assert!(ActionKind::StrengthenTerritory.tie_rank() < ActionKind::Hunt.tie_rank());
    }

    #[test]
    fn test_step_report_serialization() {
        let mut pressures = BTreeMap::new();
        pressures.insert(NeedCategory::Thirst, 0.8);
        let report = StepReport {
            agent: 3,
            tick: 12,
            chosen_action: ActionKind::SeekWater,
            category_pressures: pressures,
            exploration_state: ExplorationSnapshot {
                mode: ExplorationMode::Settled,
                intensity: 1.0,
                duration: 0,
                life_crisis: 0.0,
                energy: 0.4,
            },
            territory_state: TerritorySnapshot {
                territory: None,
                coherence_factor: 0.5,
                inside: false,
                members: 0,
            },
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"chosen_action\":\"seek_water\""));
        assert!(json.contains("\"thirst\":0.8"));
    }
}

//! Behavior Priority Selector
//!
//! Scores every candidate action in [0, 1] from the need pressures and the
//! exploration state. Equal scores fall back to the fixed priority order of
//! `ActionKind` (water first, exploring last).

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use village_events::{ActionKind, NeedCategory, Season};

use crate::config::MotivationKind;

/// Constants for action scoring
pub mod priority_constants {
    /// Territory factor below which the agent wants to go back
    pub const RETURN_FACTOR: f32 = 0.8;
    pub const STRENGTHEN_WEIGHT: f32 = 0.3;
    pub const STRENGTHEN_CAP: f32 = 0.5;
    pub const HUNT_WEIGHT: f32 = 1.2;
    /// Returning home is damped while exploring
    pub const EXPLORING_RETURN_DAMPING: f32 = 0.3;
    pub const EXPLORE_PER_INTENSITY: f32 = 0.4;
    /// Idle wandering when nothing else presses
    pub const EXPLORE_BASELINE: f32 = 0.05;
}

/// Inputs to the hunting future-motivation factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotivationInputs {
    pub tick: u64,
    pub hunger: f32,
    pub season: Season,
    pub resource_scarcity: f32,
    pub success_rate: f32,
}

/// Resource: strategy for the hunting future-motivation factor.
///
/// Picked once from config when the world is built.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HuntMotivation {
    /// Local trend-based formula
    #[default]
    Simple,
    /// Forecast of scarcity risk and large-prey opportunity
    Forecasted,
}

impl From<MotivationKind> for HuntMotivation {
    fn from(kind: MotivationKind) -> Self {
        match kind {
            MotivationKind::Simple => HuntMotivation::Simple,
            MotivationKind::Forecasted => HuntMotivation::Forecasted,
        }
    }
}

impl HuntMotivation {
    pub fn factor(&self, inputs: &MotivationInputs) -> f32 {
        match self {
            HuntMotivation::Simple => simple_motivation(inputs),
            HuntMotivation::Forecasted => forecasted_motivation(inputs),
        }
    }
}

fn simple_motivation(inputs: &MotivationInputs) -> f32 {
    let hunger_trend = (inputs.hunger / 40.0).min(1.5);
    let seasonal = if inputs.season.is_lean() { 1.4 } else { 1.0 };
    let scarcity = if inputs.resource_scarcity > 0.7 {
        1.6
    } else if inputs.resource_scarcity > 0.4 {
        1.3
    } else {
        1.0
    };
    let experience = inputs.success_rate * 0.8;

    let motivation = 1.0
        + (hunger_trend - 1.0) * 0.5
        + (seasonal - 1.0) * 0.6
        + (scarcity - 1.0) * 0.7
        + experience * 0.4;
    motivation.clamp(0.8, 2.2)
}

fn forecasted_motivation(inputs: &MotivationInputs) -> f32 {
    let scarcity_risk = if inputs.resource_scarcity > 0.7 {
        2.0
    } else if inputs.resource_scarcity > 0.5 {
        1.6
    } else {
        1.2
    };
    let large_prey = if inputs.season.is_lean() && inputs.resource_scarcity > 0.6 {
        1.8
    } else {
        1.3
    };
    let age_days = inputs.tick as f32 / 100.0;
    let time_factor = (1.0 + age_days * 0.01).min(1.5);

    let motivation = 1.0
        + (scarcity_risk - 1.0) * 0.6
        + (large_prey - 1.0) * 0.7
        + (time_factor - 1.0) * 0.3;
    motivation.min(3.2)
}

/// Agent state the selector needs besides the pressures
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorState {
    pub exploring: bool,
    pub exploration_intensity: f32,
    pub has_territory: bool,
    pub territory_factor: f32,
    pub kappa_territory: f32,
    pub hunt_motivation: f32,
    /// Critically injured agents cannot hunt, explore or work on territory
    pub incapacitated: bool,
    /// Willingness to care for an injured neighbour, 0 if none is near
    pub care_willingness: f32,
}

impl Default for SelectorState {
    fn default() -> Self {
        Self {
            exploring: false,
            exploration_intensity: 1.0,
            has_territory: false,
            territory_factor: 0.5,
            kappa_territory: 0.5,
            hunt_motivation: 1.0,
            incapacitated: false,
            care_willingness: 0.0,
        }
    }
}

/// Score every action and sort best first
pub fn rank(
    pressures: &BTreeMap<NeedCategory, f32>,
    state: &SelectorState,
) -> Vec<(ActionKind, f32)> {
    use priority_constants::*;

    let pressure = |need: NeedCategory| pressures.get(&need).copied().unwrap_or(0.0);
    let mut scores: Vec<(ActionKind, f32)> = Vec::with_capacity(8);

    scores.push((ActionKind::SeekWater, pressure(NeedCategory::Thirst)));
    scores.push((ActionKind::SeekFood, pressure(NeedCategory::Hunger)));

    let mobile = !state.incapacitated;
    let (ret, strengthen) = if state.has_territory && mobile {
        if state.territory_factor < RETURN_FACTOR {
            let mut ret = pressure(NeedCategory::Territory);
            if state.exploring {
                ret *= EXPLORING_RETURN_DAMPING;
            }
            (ret, 0.0)
        } else {
            let strengthen = (state.kappa_territory * state.territory_factor * STRENGTHEN_WEIGHT)
                .min(STRENGTHEN_CAP);
            (0.0, strengthen)
        }
    } else {
        (0.0, 0.0)
    };
    scores.push((ActionKind::ReturnToTerritory, ret));
    scores.push((ActionKind::StrengthenTerritory, strengthen));

    let hunt = if mobile {
        pressure(NeedCategory::Hunting) * state.hunt_motivation * HUNT_WEIGHT
    } else {
        0.0
    };
    scores.push((ActionKind::Hunt, hunt));

    let rest = if state.incapacitated {
        1.0
    } else {
        pressure(NeedCategory::Fatigue)
    };
    scores.push((ActionKind::Rest, rest));

    let care = if mobile { state.care_willingness } else { 0.0 };
    scores.push((ActionKind::CareForInjured, care));

    let explore = if !mobile {
        0.0
    } else if state.exploring {
        state.exploration_intensity * EXPLORE_PER_INTENSITY
    } else {
        EXPLORE_BASELINE
    };
    scores.push((ActionKind::Explore, explore));

    for (_, score) in scores.iter_mut() {
        *score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
    scores.sort_by(|(a, sa), (b, sb)| {
        sb.total_cmp(sa)
            .then_with(|| a.tie_rank().cmp(&b.tie_rank()))
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressures(entries: &[(NeedCategory, f32)]) -> BTreeMap<NeedCategory, f32> {
        let mut map: BTreeMap<NeedCategory, f32> =
            NeedCategory::all().iter().map(|n| (*n, 0.0)).collect();
        for (need, value) in entries {
            map.insert(*need, *value);
        }
        map
    }

    #[test]
    fn test_scores_in_unit_range() {
        let ranked = rank(
            &pressures(&[(NeedCategory::Hunting, 1.0)]),
            &SelectorState {
                hunt_motivation: 3.0,
                ..SelectorState::default()
            },
        );
        assert_eq!(ranked.len(), 8);
        assert!(ranked.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
        assert_eq!(ranked[0], (ActionKind::Hunt, 1.0));
    }

    #[test]
    fn test_ties_follow_priority_order() {
        let ranked = rank(
            &pressures(&[
                (NeedCategory::Thirst, 0.7),
                (NeedCategory::Hunger, 0.7),
                (NeedCategory::Fatigue, 0.7),
            ]),
            &SelectorState::default(),
        );
        let top: Vec<ActionKind> = ranked.iter().take(3).map(|(a, _)| *a).collect();
        assert_eq!(top, vec![ActionKind::SeekWater, ActionKind::SeekFood, ActionKind::Rest]);
    }

    #[test]
    fn test_water_beats_hunt_at_equal_score() {
        let ranked = rank(
            &pressures(&[(NeedCategory::Thirst, 0.6), (NeedCategory::Hunting, 0.5)]),
            &SelectorState::default(),
        );
        // hunt = 0.5 * 1.0 * 1.2 = 0.6
        assert_eq!(ranked[0].0, ActionKind::SeekWater);
        assert_eq!(ranked[1].0, ActionKind::Hunt);
    }

    #[test]
    fn test_return_home_damped_while_exploring() {
        let p = pressures(&[(NeedCategory::Territory, 0.5)]);
        let settled = SelectorState {
            has_territory: true,
            territory_factor: 0.4,
            ..SelectorState::default()
        };
        let exploring = SelectorState {
            exploring: true,
            ..settled.clone()
        };
        let score = |state: &SelectorState| {
            rank(&p, state)
                .into_iter()
                .find(|(a, _)| *a == ActionKind::ReturnToTerritory)
                .map(|(_, s)| s)
                .unwrap()
        };
        assert!((score(&settled) - 0.5).abs() < 1e-6);
        assert!((score(&exploring) - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_incapacitated_agent_rests() {
        let ranked = rank(
            &pressures(&[(NeedCategory::Hunting, 1.0), (NeedCategory::Thirst, 0.2)]),
            &SelectorState {
                incapacitated: true,
                exploring: true,
                ..SelectorState::default()
            },
        );
        assert_eq!(ranked[0].0, ActionKind::Rest);
        let hunt = ranked.iter().find(|(a, _)| *a == ActionKind::Hunt).unwrap();
        assert_eq!(hunt.1, 0.0);
    }

    #[test]
    fn test_simple_motivation_bounds() {
        let calm = MotivationInputs {
            tick: 0,
            hunger: 0.0,
            season: Season::Summer,
            resource_scarcity: 0.0,
            success_rate: 0.0,
        };
        assert!((HuntMotivation::Simple.factor(&calm) - 0.8).abs() < 1e-6);

        let desperate = MotivationInputs {
            hunger: 200.0,
            season: Season::Winter,
            resource_scarcity: 0.9,
            success_rate: 1.0,
            ..calm
        };
        assert!((HuntMotivation::Simple.factor(&desperate) - 2.2).abs() < 1e-6);
    }

    #[test]
    fn test_forecasted_motivation_rises_with_scarcity() {
        let base = MotivationInputs {
            tick: 0,
            hunger: 50.0,
            season: Season::Winter,
            resource_scarcity: 0.2,
            success_rate: 0.0,
        };
        let scarce = MotivationInputs {
            resource_scarcity: 0.8,
            ..base
        };
        let low = HuntMotivation::Forecasted.factor(&base);
        let high = HuntMotivation::Forecasted.factor(&scarce);
        assert!((low - 1.33).abs() < 1e-5);
        assert!(high > low);
        assert!(high <= 3.2);
    }

    #[test]
    fn test_strategy_resolved_from_config() {
        assert_eq!(HuntMotivation::from(MotivationKind::Forecasted), HuntMotivation::Forecasted);
        assert_eq!(HuntMotivation::default(), HuntMotivation::Simple);
    }
}

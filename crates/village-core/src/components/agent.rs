//! Agent Components
//!
//! Components for individual agents: identity, personality, body state.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::world::{HuntGroupId, TerritoryId};

/// Marker component identifying an entity as an agent
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Stable numeric identifier for an agent.
///
/// All cross-agent state (trust, boundaries, hunt groups, care) is keyed by
/// this id and resolved through the `Roster`, never by entity reference.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{:03}", self.0)
    }
}

/// Human-readable name for an agent
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct AgentName(pub String);

/// Personality archetype an agent was generated from
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Pioneer,
    Adventurer,
    Tracker,
    Scholar,
    Warrior,
    Guardian,
    Healer,
    Diplomat,
    Forager,
    Leader,
    Loner,
    Nomad,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[
            Role::Pioneer,
            Role::Adventurer,
            Role::Tracker,
            Role::Scholar,
            Role::Warrior,
            Role::Guardian,
            Role::Healer,
            Role::Diplomat,
            Role::Forager,
            Role::Leader,
            Role::Loner,
            Role::Nomad,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Pioneer => "pioneer",
            Role::Adventurer => "adventurer",
            Role::Tracker => "tracker",
            Role::Scholar => "scholar",
            Role::Warrior => "warrior",
            Role::Guardian => "guardian",
            Role::Healer => "healer",
            Role::Diplomat => "diplomat",
            Role::Forager => "forager",
            Role::Leader => "leader",
            Role::Loner => "loner",
            Role::Nomad => "nomad",
        }
    }

    /// Preset traits for this archetype
    pub fn traits(self) -> Traits {
        let (curiosity, sociability, risk_tolerance, empathy) = match self {
            Role::Pioneer => (0.9, 0.4, 0.8, 0.4),
            Role::Adventurer => (0.8, 0.5, 0.9, 0.3),
            Role::Tracker => (0.6, 0.3, 0.6, 0.4),
            Role::Scholar => (0.9, 0.4, 0.3, 0.6),
            Role::Warrior => (0.3, 0.6, 0.9, 0.4),
            Role::Guardian => (0.3, 0.7, 0.6, 0.8),
            Role::Healer => (0.4, 0.8, 0.2, 0.9),
            Role::Diplomat => (0.5, 0.9, 0.4, 0.8),
            Role::Forager => (0.5, 0.5, 0.3, 0.5),
            Role::Leader => (0.6, 0.8, 0.6, 0.6),
            Role::Loner => (0.6, 0.1, 0.5, 0.2),
            Role::Nomad => (0.8, 0.3, 0.7, 0.3),
        };
        Traits::new(curiosity, sociability, risk_tolerance, empathy)
    }

    /// Roles that value social experiences more
    pub fn is_social(self) -> bool {
        matches!(self, Role::Diplomat | Role::Healer)
    }

    /// Roles that value defense more
    pub fn is_defender(self) -> bool {
        matches!(self, Role::Warrior | Role::Guardian)
    }

    /// Roles that value discovery more
    pub fn is_discoverer(self) -> bool {
        matches!(self, Role::Scholar | Role::Pioneer)
    }
}

/// Agent personality traits - fixed at creation
/// All values are 0.0 to 1.0
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Drive to seek out the unknown
    pub curiosity: f32,
    /// Frequency of voluntary interaction
    pub sociability: f32,
    /// Willingness to take risks
    pub risk_tolerance: f32,
    /// Readiness to care for others
    pub empathy: f32,
}

impl Traits {
    pub fn new(curiosity: f32, sociability: f32, risk_tolerance: f32, empathy: f32) -> Self {
        Self {
            curiosity: curiosity.clamp(0.0, 1.0),
            sociability: sociability.clamp(0.0, 1.0),
            risk_tolerance: risk_tolerance.clamp(0.0, 1.0),
            empathy: empathy.clamp(0.0, 1.0),
        }
    }
}

impl Default for Traits {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.5)
    }
}

/// Whether the agent is alive
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alive(pub bool);

impl Alive {
    pub fn new() -> Self {
        Self(true)
    }

    pub fn is_alive(&self) -> bool {
        self.0
    }

    pub fn kill(&mut self) {
        self.0 = false;
    }
}

impl Default for Alive {
    fn default() -> Self {
        Self::new()
    }
}

/// Physiological needs. Higher is worse; every value stays non-negative.
#[derive(Component, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Physiology {
    pub hunger: f32,
    pub thirst: f32,
    pub fatigue: f32,
}

impl Physiology {
    pub fn new(hunger: f32, thirst: f32, fatigue: f32) -> Self {
        Self {
            hunger: hunger.max(0.0),
            thirst: thirst.max(0.0),
            fatigue: fatigue.max(0.0),
        }
    }

    pub fn add_hunger(&mut self, amount: f32) {
        self.hunger = (self.hunger + amount).max(0.0);
    }

    pub fn add_thirst(&mut self, amount: f32) {
        self.thirst = (self.thirst + amount).max(0.0);
    }

    pub fn add_fatigue(&mut self, amount: f32) {
        self.fatigue = (self.fatigue + amount).max(0.0);
    }
}

/// A wound that limits what the agent can do until it heals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injury {
    pub critical: bool,
    /// Ticks of recovery left; care makes this fall faster
    pub remaining: f32,
    pub caregiver: Option<AgentId>,
}

/// Injury state and recent injury history
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Health {
    pub injury: Option<Injury>,
    pub last_injured_at: Option<u64>,
}

impl Health {
    pub fn is_injured(&self) -> bool {
        self.injury.is_some()
    }

    pub fn is_critical(&self) -> bool {
        self.injury.as_ref().is_some_and(|i| i.critical)
    }

    pub fn injured_within(&self, tick: u64, window: u64) -> bool {
        self.last_injured_at
            .is_some_and(|at| tick.saturating_sub(at) <= window)
    }

    pub fn injure(&mut self, tick: u64, critical: bool, duration: f32) {
        // A fresh wound never downgrades an existing critical one
        let critical = critical || self.is_critical();
        let remaining = self
            .injury
            .as_ref()
            .map_or(duration, |i| i.remaining.max(duration));
        let caregiver = self.injury.as_ref().and_then(|i| i.caregiver);
        self.injury = Some(Injury {
            critical,
            remaining,
            caregiver,
        });
        self.last_injured_at = Some(tick);
    }
}

/// Hunting history and current hunt-group membership
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct HuntRecord {
    pub attempts: u32,
    pub successes: u32,
    pub group: Option<HuntGroupId>,
}

impl HuntRecord {
    /// Success ratio, 0.0 with no attempts
    pub fn success_rate(&self) -> f32 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f32 / self.attempts as f32
    }

    /// Skill grows with demonstrated success
    pub fn skill(&self) -> f32 {
        (0.3 + self.success_rate() * 0.5).min(1.0)
    }
}

/// Territory the agent belongs to, if any
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerritoryLink(pub Option<TerritoryId>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physiology_clamped_non_negative() {
        let mut body = Physiology::new(-5.0, 10.0, 3.0);
        assert_eq!(body.hunger, 0.0);
        body.add_thirst(-50.0);
        assert_eq!(body.thirst, 0.0);
        body.add_fatigue(2.0);
        assert_eq!(body.fatigue, 5.0);
    }

    #[test]
    fn test_role_presets_in_range() {
        for role in Role::all() {
            let t = role.traits();
            for v in [t.curiosity, t.sociability, t.risk_tolerance, t.empathy] {
                assert!((0.0..=1.0).contains(&v), "{} out of range", role.name());
            }
        }
        assert!(Role::Healer.is_social());
        assert!(Role::Guardian.is_defender());
        assert!(Role::Scholar.is_discoverer());
    }

    #[test]
    fn test_success_rate_without_attempts() {
        let record = HuntRecord::default();
        assert_eq!(record.success_rate(), 0.0);
        assert!((record.skill() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_injury_keeps_critical() {
        let mut health = Health::default();
        health.injure(10, true, 80.0);
        health.injure(12, false, 10.0);
        assert!(health.is_critical());
        assert_eq!(health.injury.as_ref().unwrap().remaining, 80.0);
        assert!(health.injured_within(30, 20));
        assert!(!health.injured_within(40, 20));
    }
}

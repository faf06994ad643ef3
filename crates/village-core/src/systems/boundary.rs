//! Subjective Boundary Engine
//!
//! Every agent keeps its own notion of what is "inside": people, places,
//! resources and activities it has come to treat as its own. Boundaries are
//! built only from remembered experience. Agents who go through a
//! qualifying experience together form a collective boundary. Interaction
//! checks consult these boundaries: inner targets invite cooperation, while
//! outer targets guarded by nearby protectors provoke a defense.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use village_events::{
    BoundaryAnalysis, CollectiveSummary, DefenseResponse, IndividualBoundarySummary,
};

use super::coherence::{Coherence, CoherenceLedger};
use super::perception::{AgentView, Population};
use crate::components::{AgentId, GridCell, HuntGroupId, Role};
use crate::config::BoundaryConfig;
use crate::movement::distance;

/// Constants for boundary dynamics
pub mod boundary_constants {
    pub const EXPANSION_RATE: f32 = 0.2;
    pub const CONTRACTION_RATE: f32 = 0.3;
    /// Strength given to every participant of a collective, at least
    pub const COLLECTIVE_PEOPLE_STRENGTH: f32 = 0.6;
    pub const COLLECTIVE_PEOPLE_STEP: f32 = 0.2;
    pub const COHESION_PER_PARTICIPANT: f32 = 0.1;
    pub const SIGNIFICANCE_PER_PARTICIPANT: f32 = 0.3;

    /// Boundary pressure above which boundaries sharpen, below which they blur
    pub const SHARPEN_PRESSURE: f32 = 0.7;
    pub const BLUR_PRESSURE: f32 = 0.3;
    pub const SHARPEN_ENERGY_DRAIN: f32 = 0.1;
    pub const SHARPEN_KAPPA_GAIN: f32 = 0.05;
    pub const BLUR_ENERGY_GAIN: f32 = 0.05;
    pub const BLUR_ENERGY_CAP: f32 = 2.0;

    /// Aggressive defense when one protector is this committed...
    pub const AGGRESSIVE_STRENGTH: f32 = 0.8;
    /// ...or more than this many supporters stand with it
    pub const AGGRESSIVE_SUPPORTERS: usize = 2;
    pub const FIRM_STRENGTH: f32 = 0.5;

    /// Integration strengths
    pub const TERRITORY_PLACE: f32 = 0.8;
    pub const TERRITORY_MEMBER: f32 = 0.7;
    pub const HUNT_PARTNER: f32 = 0.8;
    pub const MEAT_BASE: f32 = 0.5;
    pub const MEAT_STEP: f32 = 0.2;
    pub const MEAT_RESOURCE: f32 = 0.6;
    pub const CARE_BOND: f32 = 0.9;
    pub const TRUST_SYNC: f32 = 0.5;
}

/// Something an agent can hold inside its boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryObject {
    Person(AgentId),
    Place(GridCell),
    Resource(String),
    Activity(String),
}

impl fmt::Display for BoundaryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryObject::Person(id) => write!(f, "{}", id),
            BoundaryObject::Place(cell) => write!(f, "{}", cell),
            BoundaryObject::Resource(name) | BoundaryObject::Activity(name) => f.write_str(name),
        }
    }
}

/// Kinds of interactions that are checked against boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    ResourceUse,
    TerritoryEnter,
    SocialApproach,
}

impl InteractionKind {
    pub fn name(self) -> &'static str {
        match self {
            InteractionKind::ResourceUse => "resource_use",
            InteractionKind::TerritoryEnter => "territory_enter",
            InteractionKind::SocialApproach => "social_approach",
        }
    }
}

/// Experiences that shape a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceKind {
    SuccessfulForaging,
    FailedForaging,
    SuccessfulHunting,
    SocialCooperation,
    ResourceSharing,
    ConflictResolution,
    HostileEncounter,
    ResourceTheft,
    SuccessfulDefense,
    CommunityBuilding,
    ExplorationDiscovery,
    WaterAccess,
    SafeRest,
    GroupHunting,
    TerritorialDefense,
    FriendlyEncounter,
    /// An interaction with something already inside the boundary
    Internal(InteractionKind),
}

impl ExperienceKind {
    /// Base valence from the fixed table. Internal interactions carry no
    /// table value; the engine scores them with its cooperation bonus.
    pub fn base_valence(self) -> f32 {
        match self {
            ExperienceKind::SuccessfulForaging => 0.7,
            ExperienceKind::FailedForaging => -0.4,
            ExperienceKind::SuccessfulHunting => 0.8,
            ExperienceKind::SocialCooperation => 0.6,
            ExperienceKind::ResourceSharing => 0.5,
            ExperienceKind::ConflictResolution => 0.3,
            ExperienceKind::HostileEncounter => -0.8,
            ExperienceKind::ResourceTheft => -0.9,
            ExperienceKind::SuccessfulDefense => 0.9,
            ExperienceKind::CommunityBuilding => 0.7,
            ExperienceKind::ExplorationDiscovery => 0.4,
            ExperienceKind::WaterAccess => 0.6,
            ExperienceKind::SafeRest => 0.5,
            ExperienceKind::GroupHunting => 0.8,
            ExperienceKind::TerritorialDefense => 0.7,
            ExperienceKind::FriendlyEncounter => 0.4,
            ExperienceKind::Internal(_) => 0.0,
        }
    }

    pub fn name(self) -> String {
        let name = match self {
            ExperienceKind::SuccessfulForaging => "successful_foraging",
            ExperienceKind::FailedForaging => "failed_foraging",
            ExperienceKind::SuccessfulHunting => "successful_hunting",
            ExperienceKind::SocialCooperation => "social_cooperation",
            ExperienceKind::ResourceSharing => "resource_sharing",
            ExperienceKind::ConflictResolution => "conflict_resolution",
            ExperienceKind::HostileEncounter => "hostile_encounter",
            ExperienceKind::ResourceTheft => "resource_theft",
            ExperienceKind::SuccessfulDefense => "successful_defense",
            ExperienceKind::CommunityBuilding => "community_building",
            ExperienceKind::ExplorationDiscovery => "exploration_discovery",
            ExperienceKind::WaterAccess => "water_access",
            ExperienceKind::SafeRest => "safe_rest",
            ExperienceKind::GroupHunting => "group_hunting",
            ExperienceKind::TerritorialDefense => "territorial_defense",
            ExperienceKind::FriendlyEncounter => "friendly_encounter",
            ExperienceKind::Internal(kind) => return format!("internal_{}", kind.name()),
        };
        name.to_string()
    }

    fn is_social(self) -> bool {
        matches!(self, ExperienceKind::SocialCooperation)
    }

    fn is_defense(self) -> bool {
        matches!(
            self,
            ExperienceKind::SuccessfulDefense | ExperienceKind::TerritorialDefense
        )
    }

    fn is_discovery(self) -> bool {
        matches!(self, ExperienceKind::ExplorationDiscovery)
    }

    fn is_foraging(self) -> bool {
        matches!(
            self,
            ExperienceKind::SuccessfulForaging | ExperienceKind::FailedForaging
        )
    }

    fn is_water(self) -> bool {
        matches!(self, ExperienceKind::WaterAccess)
    }

    /// Experiences about food or water sources
    pub fn is_resource(self) -> bool {
        self.is_foraging()
            || self.is_water()
            || matches!(
                self,
                ExperienceKind::SuccessfulHunting | ExperienceKind::GroupHunting
            )
    }
}

/// What an experience or interaction is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceTarget {
    Agent(AgentId),
    Location(GridCell),
    Named(String),
}

impl ExperienceTarget {
    /// Categorize the target: agents are people, locations are places, and
    /// named targets are resources for food/water experiences, activities
    /// otherwise.
    pub fn to_object(&self, kind: ExperienceKind) -> BoundaryObject {
        match self {
            ExperienceTarget::Agent(id) => BoundaryObject::Person(*id),
            ExperienceTarget::Location(cell) => BoundaryObject::Place(*cell),
            ExperienceTarget::Named(name) if kind.is_resource() => {
                BoundaryObject::Resource(name.clone())
            }
            ExperienceTarget::Named(name) => BoundaryObject::Activity(name.clone()),
        }
    }

    /// Categorization for interaction checks, where no experience kind applies
    pub fn interaction_object(&self, kind: InteractionKind) -> BoundaryObject {
        match (self, kind) {
            (ExperienceTarget::Named(name), InteractionKind::ResourceUse) => {
                BoundaryObject::Resource(name.clone())
            }
            _ => self.to_object(ExperienceKind::Internal(kind)),
        }
    }
}

/// One agent's inner sets plus the signed strength of every tracked object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectiveBoundary {
    pub people: BTreeSet<AgentId>,
    pub places: BTreeSet<GridCell>,
    pub resources: BTreeSet<String>,
    pub activities: BTreeSet<String>,
    strength: BTreeMap<BoundaryObject, f32>,
}

impl SubjectiveBoundary {
    pub fn strength(&self, object: &BoundaryObject) -> f32 {
        self.strength.get(object).copied().unwrap_or(0.0)
    }

    /// Set strength, clamped to [-1, 1]
    pub fn set_strength(&mut self, object: BoundaryObject, value: f32) -> f32 {
        let value = if value.is_finite() {
            value.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self.strength.insert(object, value);
        value
    }

    pub fn contains(&self, object: &BoundaryObject) -> bool {
        match object {
            BoundaryObject::Person(id) => self.people.contains(id),
            BoundaryObject::Place(cell) => self.places.contains(cell),
            BoundaryObject::Resource(name) => self.resources.contains(name),
            BoundaryObject::Activity(name) => self.activities.contains(name),
        }
    }

    /// Membership that protectors defend (activities are not guarded)
    fn guards(&self, object: &BoundaryObject) -> bool {
        !matches!(object, BoundaryObject::Activity(_)) && self.contains(object)
    }

    pub fn insert(&mut self, object: &BoundaryObject) {
        match object {
            BoundaryObject::Person(id) => {
                self.people.insert(*id);
            }
            BoundaryObject::Place(cell) => {
                self.places.insert(*cell);
            }
            BoundaryObject::Resource(name) => {
                self.resources.insert(name.clone());
            }
            BoundaryObject::Activity(name) => {
                self.activities.insert(name.clone());
            }
        }
    }

    pub fn remove(&mut self, object: &BoundaryObject) {
        match object {
            BoundaryObject::Person(id) => {
                self.people.remove(id);
            }
            BoundaryObject::Place(cell) => {
                self.places.remove(cell);
            }
            BoundaryObject::Resource(name) => {
                self.resources.remove(name);
            }
            BoundaryObject::Activity(name) => {
                self.activities.remove(name);
            }
        }
    }

    /// Fraction of tracked objects with |strength| > 0.5
    pub fn clarity(&self) -> f32 {
        if self.strength.is_empty() {
            return 0.0;
        }
        let clear = self.strength.values().filter(|s| s.abs() > 0.5).count();
        clear as f32 / self.strength.len() as f32
    }

    fn summary(&self) -> IndividualBoundarySummary {
        IndividualBoundarySummary {
            inner_people: self.people.len(),
            inner_places: self.places.len(),
            inner_resources: self.resources.len(),
            inner_activities: self.activities.len(),
            clarity: self.clarity(),
        }
    }
}

/// A group-level boundary
#[derive(Debug, Clone, PartialEq)]
pub struct CollectiveBoundary {
    pub members: BTreeSet<AgentId>,
    pub cohesion: f32,
    pub formed_at: u64,
    pub shared_experiences: usize,
    pub last_experience: String,
}

/// A recorded boundary violation
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub tick: u64,
    pub violator: AgentId,
    pub protector: AgentId,
    pub response: DefenseResponse,
    pub resolved: bool,
}

/// How an interaction check came out
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionResponse {
    /// Nobody inside or guarding: proceed
    Neutral,
    /// Target is inside the actor's boundary
    Cooperative { bonus: f32 },
    /// A protector reacted
    Defense {
        response: DefenseResponse,
        protector: AgentId,
        supporters: Vec<AgentId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResult {
    pub allowed: bool,
    pub response: InteractionResponse,
}

impl InteractionResult {
    pub fn defense(&self) -> Option<DefenseResponse> {
        match &self.response {
            InteractionResponse::Defense { response, .. } => Some(*response),
            _ => None,
        }
    }
}

/// What processing an experience did
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceOutcome {
    pub valence: f32,
    pub object: BoundaryObject,
    pub strength: f32,
    pub shared_participants: Vec<AgentId>,
    pub collective: Option<String>,
}

/// Resource: all subjective and collective boundaries
#[derive(Resource, Debug, Clone, Default)]
pub struct BoundaryEngine {
    boundaries: BTreeMap<AgentId, SubjectiveBoundary>,
    collectives: BTreeMap<String, CollectiveBoundary>,
    violations: BTreeMap<BoundaryObject, Vec<Violation>>,
    config: BoundaryConfig,
}

impl BoundaryEngine {
    pub fn new(config: BoundaryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn boundary(&self, agent: AgentId) -> Option<&SubjectiveBoundary> {
        self.boundaries.get(&agent)
    }

    pub fn boundary_mut(&mut self, agent: AgentId) -> &mut SubjectiveBoundary {
        self.boundaries.entry(agent).or_default()
    }

    pub fn strength(&self, agent: AgentId, object: &BoundaryObject) -> f32 {
        self.boundaries
            .get(&agent)
            .map_or(0.0, |b| b.strength(object))
    }

    pub fn collective(&self, key: &str) -> Option<&CollectiveBoundary> {
        self.collectives.get(key)
    }

    pub fn collectives(&self) -> impl Iterator<Item = (&String, &CollectiveBoundary)> {
        self.collectives.iter()
    }

    pub fn violations_at(&self, object: &BoundaryObject) -> &[Violation] {
        self.violations.get(object).map_or(&[], |v| v.as_slice())
    }

    /// Set an object's strength and re-evaluate membership with hysteresis:
    /// above the expansion threshold it joins, below the contraction
    /// threshold it leaves, in between nothing changes.
    pub fn set_strength(&mut self, agent: AgentId, object: BoundaryObject, value: f32) -> f32 {
        let expand = self.config.expansion_threshold;
        let contract = self.config.contraction_threshold;
        let boundary = self.boundary_mut(agent);
        let value = boundary.set_strength(object.clone(), value);
        if value > expand {
            boundary.insert(&object);
        } else if value < contract {
            boundary.remove(&object);
        }
        value
    }

    /// Signed valence of an experience for this agent
    pub fn valence(&self, kind: ExperienceKind, subject: Option<&AgentView>) -> f32 {
        let mut valence = match kind {
            ExperienceKind::Internal(_) => self.config.cooperation_bonus,
            _ => kind.base_valence(),
        };

        if let Some(view) = subject {
            let role = view.role;
            if kind.is_social() && role.is_some_and(Role::is_social) {
                valence += 0.2;
            } else if kind.is_defense() && role.is_some_and(Role::is_defender) {
                valence += 0.3;
            } else if kind.is_discovery() && role.is_some_and(Role::is_discoverer) {
                valence += 0.2;
            }
            if view.hunger > 150.0 && kind.is_foraging() {
                valence += 0.3;
            }
            if view.thirst > 120.0 && kind.is_water() {
                valence += 0.4;
            }
        }
        valence.clamp(-1.0, 1.0)
    }

    /// Others nearby engaged in a correlated activity: same territory, same
    /// hunt group, or the same exploration mode.
    fn shared_participants(&self, subject: &AgentView, population: &Population) -> Vec<AgentId> {
        population
            .living_within(subject.position, self.config.shared_context_radius, subject.id)
            .filter(|other| {
                let same_territory =
                    subject.territory.is_some() && subject.territory == other.territory;
                let same_hunt =
                    subject.hunt_group.is_some() && subject.hunt_group == other.hunt_group;
                same_territory || same_hunt || subject.exploring == other.exploring
            })
            .map(|other| other.id)
            .collect()
    }

    /// Fold an experience into `agent`'s boundary.
    ///
    /// Positive valence above the threshold expands the boundary, negative
    /// below the mirrored threshold contracts it. A qualifying positive
    /// experience shared with nearby agents forms or extends a collective.
    pub fn process_experience(
        &mut self,
        agent: AgentId,
        kind: ExperienceKind,
        target: &ExperienceTarget,
        population: &Population,
        ledger: &mut CoherenceLedger,
        tick: u64,
    ) -> ExperienceOutcome {
        use boundary_constants::*;

        let subject = population.get(agent);
        let valence = self.valence(kind, subject);
        let shared = subject
            .map(|s| self.shared_participants(s, population))
            .unwrap_or_default();
        let object = target.to_object(kind);

        let threshold = self.config.positive_valence;
        let mut strength = self.strength(agent, &object);
        if valence > threshold {
            strength = self.set_strength(
                agent,
                object.clone(),
                (strength + valence * EXPANSION_RATE).min(1.0),
            );
        } else if valence < -threshold {
            strength = self.set_strength(
                agent,
                object.clone(),
                (strength - valence.abs() * CONTRACTION_RATE).max(-1.0),
            );
        }

        let collective = if valence > threshold && !shared.is_empty() {
            Some(self.form_collective(agent, &shared, kind, tick))
        } else {
            None
        };

        let significance = if shared.is_empty() {
            0.0
        } else {
            (shared.len() as f32 * SIGNIFICANCE_PER_PARTICIPANT).min(1.0)
        };
        let pressure = valence.abs() * (1.0 + significance);
        if pressure > SHARPEN_PRESSURE {
            ledger.drain_energy(pressure * SHARPEN_ENERGY_DRAIN);
            ledger.adjust_kappa(Coherence::BoundaryFormation, SHARPEN_KAPPA_GAIN);
        } else if pressure < BLUR_PRESSURE && ledger.energy() < BLUR_ENERGY_CAP {
            ledger.add_energy(BLUR_ENERGY_GAIN, BLUR_ENERGY_CAP);
        }

        tracing::trace!(
            agent = agent.0,
            experience = %kind.name(),
            object = %object,
            valence,
            strength,
            shared = shared.len(),
            "boundary experience"
        );

        ExperienceOutcome {
            valence,
            object,
            strength,
            shared_participants: shared,
            collective,
        }
    }

    fn form_collective(
        &mut self,
        agent: AgentId,
        shared: &[AgentId],
        kind: ExperienceKind,
        tick: u64,
    ) -> String {
        use boundary_constants::*;

        let mut participants: Vec<AgentId> = shared.to_vec();
        participants.push(agent);
        participants.sort();
        participants.dedup();

        let key = format!(
            "collective_{}",
            participants
                .iter()
                .map(|p| p.0.to_string())
                .collect::<Vec<_>>()
                .join("_")
        );
        let collective = self
            .collectives
            .entry(key.clone())
            .or_insert_with(|| CollectiveBoundary {
                members: BTreeSet::new(),
                cohesion: 0.0,
                formed_at: tick,
                shared_experiences: 0,
                last_experience: String::new(),
            });
        collective.members.extend(participants.iter().copied());
        collective.shared_experiences += 1;
        collective.last_experience = kind.name();
        collective.cohesion =
            (collective.cohesion + participants.len() as f32 * COHESION_PER_PARTICIPANT).min(1.0);

        self.bond_all(&participants, |current| {
            (current + COLLECTIVE_PEOPLE_STEP).max(COLLECTIVE_PEOPLE_STRENGTH)
        });
        key
    }

    /// Put every pair of `members` into each other's people set
    fn bond_all(&mut self, members: &[AgentId], strength: impl Fn(f32) -> f32) {
        for a in members {
            for b in members {
                if a == b {
                    continue;
                }
                let person = BoundaryObject::Person(*b);
                let value = strength(self.strength(*a, &person)).clamp(-1.0, 1.0);
                let boundary = self.boundary_mut(*a);
                boundary.set_strength(person.clone(), value);
                boundary.insert(&person);
            }
        }
    }

    fn shares_collective(&self, a: AgentId, b: AgentId) -> bool {
        self.collectives
            .values()
            .any(|c| c.members.contains(&a) && c.members.contains(&b))
    }

    /// Whether `object` is inside `agent`'s boundary: a direct member, a
    /// fellow collective member, or simply held with enough strength.
    pub fn is_within(&self, agent: AgentId, object: &BoundaryObject) -> bool {
        if self.boundary(agent).is_some_and(|b| b.contains(object)) {
            return true;
        }
        if let BoundaryObject::Person(other) = object {
            if self.shares_collective(agent, *other) {
                return true;
            }
        }
        self.strength(agent, object) > self.config.within_strength
    }

    /// Check whether `actor` may perform `kind` on `target`.
    ///
    /// Inner targets are a cooperative interaction, folded back in as an
    /// internal experience. Outer targets are looked up among nearby
    /// protectors; the strongest one decides the response.
    pub fn check_interaction(
        &mut self,
        actor: AgentId,
        target: &ExperienceTarget,
        kind: InteractionKind,
        population: &Population,
        ledger: &mut CoherenceLedger,
        tick: u64,
    ) -> InteractionResult {
        let object = target.interaction_object(kind);

        if self.is_within(actor, &object) {
            self.process_experience(
                actor,
                ExperienceKind::Internal(kind),
                target,
                population,
                ledger,
                tick,
            );
            return InteractionResult {
                allowed: true,
                response: InteractionResponse::Cooperative {
                    bonus: self.config.cooperation_bonus,
                },
            };
        }

        let Some(actor_view) = population.get(actor) else {
            return InteractionResult {
                allowed: true,
                response: InteractionResponse::Neutral,
            };
        };

        let mut protectors: Vec<(AgentId, f32)> = population
            .living()
            .filter(|p| p.id != actor)
            .filter(|p| distance(actor_view.position, p.position) < self.config.protector_radius)
            .filter_map(|p| {
                let boundary = self.boundary(p.id)?;
                let strength = boundary.strength(&object);
                (boundary.guards(&object) && strength > self.config.protector_min_strength)
                    .then_some((p.id, strength))
            })
            .collect();
        if protectors.is_empty() {
            return InteractionResult {
                allowed: true,
                response: InteractionResponse::Neutral,
            };
        }

        protectors.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let (protector, strength) = protectors[0];
        let supporters: Vec<AgentId> = protectors[1..].iter().map(|(id, _)| *id).collect();

        let (response, allowed) = escalate(strength, supporters.len());
        self.violations.entry(object.clone()).or_default().push(Violation {
            tick,
            violator: actor,
            protector,
            response,
            resolved: response != DefenseResponse::AggressiveDefense,
        });
        tracing::debug!(
            violator = actor.0,
            protector = protector.0,
            target = %object,
            ?response,
            supporters = supporters.len(),
            "boundary violation"
        );

        InteractionResult {
            allowed,
            response: InteractionResponse::Defense {
                response,
                protector,
                supporters,
            },
        }
    }

    /// A territory becomes a strongly held place, its members inner people
    pub fn integrate_territory(&mut self, agent: AgentId, center: GridCell, members: &[AgentId]) {
        use boundary_constants::*;

        self.set_strength(agent, BoundaryObject::Place(center), TERRITORY_PLACE);
        for member in members.iter().filter(|m| **m != agent) {
            self.set_strength(agent, BoundaryObject::Person(*member), TERRITORY_MEMBER);
        }
    }

    /// Hunt partners bond with each other and form a named collective
    pub fn integrate_hunt_group(&mut self, group: HuntGroupId, members: &[AgentId], tick: u64) {
        use boundary_constants::*;

        if members.len() < 2 {
            return;
        }
        let key = format!("hunt_group_{}", group.0);
        let collective = self
            .collectives
            .entry(key)
            .or_insert_with(|| CollectiveBoundary {
                members: BTreeSet::new(),
                cohesion: 0.0,
                formed_at: tick,
                shared_experiences: 0,
                last_experience: String::new(),
            });
        collective.members.extend(members.iter().copied());
        collective.shared_experiences += 1;
        collective.last_experience = ExperienceKind::GroupHunting.name();
        collective.cohesion =
            (collective.cohesion + members.len() as f32 * COHESION_PER_PARTICIPANT).min(1.0);

        self.bond_all(members, |_| HUNT_PARTNER);
    }

    /// Meat sharing draws giver and receiver closer, and the shared meat
    /// becomes a resource both hold
    pub fn integrate_meat_sharing(&mut self, giver: AgentId, receiver: AgentId, tick: u64) {
        use boundary_constants::*;

        if giver == receiver {
            return;
        }
        for (a, b) in [(giver, receiver), (receiver, giver)] {
            let person = BoundaryObject::Person(b);
            let current = self
                .boundary(a)
                .and_then(|boundary| boundary.strength.get(&person).copied())
                .unwrap_or(MEAT_BASE);
            self.set_strength(a, person, (current + MEAT_STEP).min(1.0));

            let meat = BoundaryObject::Resource(format!("shared_meat_{}", tick));
            self.set_strength(a, meat, MEAT_RESOURCE);
        }
    }

    /// Caring through an injury forms a strong mutual bond
    pub fn integrate_care(&mut self, caregiver: AgentId, patient: AgentId) {
        use boundary_constants::*;

        self.bond_all(&[caregiver, patient], |current| current.max(CARE_BOND));
    }

    /// Mirror a trust value into the person strength
    pub fn sync_trust(&mut self, a: AgentId, b: AgentId, trust: f32) {
        if a == b {
            return;
        }
        self.set_strength(a, BoundaryObject::Person(b), trust * boundary_constants::TRUST_SYNC);
    }

    /// Drop an evicted agent's own boundary. Others may still remember it.
    pub fn forget(&mut self, agent: AgentId) {
        self.boundaries.remove(&agent);
    }

    /// Per-agent and collective summaries over living agents
    pub fn analysis(&self, population: &Population) -> BoundaryAnalysis {
        let individual_boundaries = self
            .boundaries
            .iter()
            .filter(|(id, _)| population.is_alive(**id))
            .map(|(id, b)| (id.0, b.summary()))
            .collect();

        let collective_boundaries = self
            .collectives
            .iter()
            .filter_map(|(key, c)| {
                let members: Vec<u32> = c
                    .members
                    .iter()
                    .filter(|m| population.is_alive(**m))
                    .map(|m| m.0)
                    .collect();
                (members.len() > 1).then(|| CollectiveSummary {
                    key: key.clone(),
                    members,
                    cohesion: c.cohesion,
                    shared_experiences: c.shared_experiences,
                })
            })
            .collect();

        let violation_count = self.violations.values().map(Vec::len).sum();
        let external_conflicts = self
            .violations
            .values()
            .flatten()
            .filter(|v| v.response == DefenseResponse::AggressiveDefense)
            .count();

        BoundaryAnalysis {
            individual_boundaries,
            collective_boundaries,
            violation_count,
            external_conflicts,
        }
    }
}

/// Map protector commitment to a response and whether the actor may proceed
pub fn escalate(strength: f32, supporters: usize) -> (DefenseResponse, bool) {
    use boundary_constants::*;

    if strength > AGGRESSIVE_STRENGTH || supporters > AGGRESSIVE_SUPPORTERS {
        (DefenseResponse::AggressiveDefense, false)
    } else if strength > FIRM_STRENGTH {
        (DefenseResponse::FirmWarning, false)
    } else {
        (DefenseResponse::MildConcern, true)
    }
}

/// `boundary_analysis(roster)` over a freshly captured population
pub fn boundary_analysis(world: &mut World) -> BoundaryAnalysis {
    let population = Population::capture(world);
    world
        .get_resource::<BoundaryEngine>()
        .map(|engine| engine.analysis(&population))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Position;

    fn view(id: u32, x: f32, y: f32) -> AgentView {
        AgentView::new(AgentId(id), Position::new(x, y))
    }

    fn engine() -> BoundaryEngine {
        BoundaryEngine::new(BoundaryConfig::default())
    }

    #[test]
    fn test_valence_table_and_modifiers() {
        let engine = engine();
        assert_eq!(engine.valence(ExperienceKind::ResourceTheft, None), -0.9);

        let mut guardian = view(1, 0.0, 0.0);
        guardian.role = Some(Role::Guardian);
        assert_eq!(engine.valence(ExperienceKind::SuccessfulDefense, Some(&guardian)), 1.0);

        let mut parched = view(2, 0.0, 0.0);
        parched.thirst = 130.0;
        assert!((engine.valence(ExperienceKind::WaterAccess, Some(&parched)) - 1.0).abs() < 1e-6);

        let mut diplomat = view(3, 0.0, 0.0);
        diplomat.role = Some(Role::Diplomat);
        let cooperation = engine.valence(ExperienceKind::SocialCooperation, Some(&diplomat));
        assert!((cooperation - 0.8).abs() < 1e-6);

        let internal = engine.valence(ExperienceKind::Internal(InteractionKind::ResourceUse), None);
        assert!((internal - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_target_categorization() {
        let spring = ExperienceTarget::Named("spring".into());
        assert_eq!(
            spring.to_object(ExperienceKind::WaterAccess),
            BoundaryObject::Resource("spring".into())
        );
        assert_eq!(
            spring.to_object(ExperienceKind::CommunityBuilding),
            BoundaryObject::Activity("spring".into())
        );
        assert_eq!(
            ExperienceTarget::Location(GridCell::new(3, 4)).to_object(ExperienceKind::SafeRest),
            BoundaryObject::Place(GridCell::new(3, 4))
        );
        assert_eq!(BoundaryObject::Place(GridCell::new(3, 4)).to_string(), "location_3_4");
    }

    #[test]
    fn test_repeated_positive_experience_adds_member() {
        let mut engine = engine();
        let population = Population::from_views(vec![view(1, 0.0, 0.0)]);
        let mut ledger = CoherenceLedger::new();
        let cave = ExperienceTarget::Location(GridCell::new(5, 5));
        let place = BoundaryObject::Place(GridCell::new(5, 5));

        // 0.5 * 0.2 = 0.1 per rest
        for _ in 0..2 {
            engine.process_experience(
                AgentId(1),
                ExperienceKind::SafeRest,
                &cave,
                &population,
                &mut ledger,
                1,
            );
        }
        assert!(!engine.boundary(AgentId(1)).unwrap().contains(&place));
        for _ in 0..3 {
            engine.process_experience(
                AgentId(1),
                ExperienceKind::SafeRest,
                &cave,
                &population,
                &mut ledger,
                2,
            );
        }
        assert!(engine.boundary(AgentId(1)).unwrap().contains(&place));
    }

    #[test]
    fn test_negative_experience_removes_member() {
        let mut engine = engine();
        let population = Population::from_views(vec![view(1, 0.0, 0.0), view(2, 100.0, 100.0)]);
        let mut ledger = CoherenceLedger::new();
        engine.set_strength(AgentId(1), BoundaryObject::Person(AgentId(2)), 0.5);
        assert!(engine.boundary(AgentId(1)).unwrap().contains(&BoundaryObject::Person(AgentId(2))));

        let outcome = engine.process_experience(
            AgentId(1),
            ExperienceKind::ResourceTheft,
            &ExperienceTarget::Agent(AgentId(2)),
            &population,
            &mut ledger,
            3,
        );
        assert!((outcome.strength - (0.5 - 0.27)).abs() < 1e-6);
        // 0.23 is above the contraction threshold: still a member
        assert!(engine.boundary(AgentId(1)).unwrap().contains(&BoundaryObject::Person(AgentId(2))));

        engine.process_experience(
            AgentId(1),
            ExperienceKind::ResourceTheft,
            &ExperienceTarget::Agent(AgentId(2)),
            &population,
            &mut ledger,
            4,
        );
        let boundary = engine.boundary(AgentId(1)).unwrap();
        assert!(!boundary.contains(&BoundaryObject::Person(AgentId(2))));
    }

    #[test]
    fn test_shared_experience_forms_collective() {
        let mut engine = engine();
        let population = Population::from_views(vec![
            view(3, 0.0, 0.0),
            view(1, 5.0, 0.0),
            view(2, 40.0, 0.0),
        ]);
        let mut ledger = CoherenceLedger::new();
        let outcome = engine.process_experience(
            AgentId(3),
            ExperienceKind::CommunityBuilding,
            &ExperienceTarget::Named("fire_circle".into()),
            &population,
            &mut ledger,
            7,
        );
        assert_eq!(outcome.shared_participants, vec![AgentId(1)]);
        let key = outcome.collective.unwrap();
        assert_eq!(key, "collective_1_3");

        let collective = engine.collective(&key).unwrap();
        assert!((collective.cohesion - 0.2).abs() < 1e-6);
        assert!(engine.strength(AgentId(1), &BoundaryObject::Person(AgentId(3))) >= 0.6);
        assert!(engine.boundary(AgentId(3)).unwrap().people.contains(&AgentId(1)));
        assert!(engine.is_within(AgentId(1), &BoundaryObject::Person(AgentId(3))));
    }

    #[test]
    fn test_negative_shared_experience_forms_no_collective() {
        let mut engine = engine();
        let population = Population::from_views(vec![view(1, 0.0, 0.0), view(2, 2.0, 0.0)]);
        let mut ledger = CoherenceLedger::new();
        let outcome = engine.process_experience(
            AgentId(1),
            ExperienceKind::HostileEncounter,
            &ExperienceTarget::Location(GridCell::new(0, 0)),
            &population,
            &mut ledger,
            1,
        );
        assert!(outcome.collective.is_none());
        assert!(engine.boundary(AgentId(1)).unwrap().people.is_empty());
    }

    #[test]
    fn test_strong_experience_sharpens_boundary() {
        let mut engine = engine();
        let population = Population::from_views(vec![view(1, 0.0, 0.0)]);
        let mut ledger = CoherenceLedger::new();
        ledger.add_energy(1.0, 5.0);
        let before = ledger.kappa(Coherence::BoundaryFormation);
        engine.process_experience(
            AgentId(1),
            ExperienceKind::SuccessfulDefense,
            &ExperienceTarget::Location(GridCell::new(1, 1)),
            &population,
            &mut ledger,
            1,
        );
        assert!((ledger.energy() - 0.91).abs() < 1e-6);
        assert!((ledger.kappa(Coherence::BoundaryFormation) - (before + 0.05)).abs() < 1e-6);
    }

    #[test]
    fn test_weak_experience_blurs_boundary() {
        let mut engine = engine();
        let population = Population::from_views(vec![view(1, 0.0, 0.0)]);
        let mut ledger = CoherenceLedger::new();
        engine.process_experience(
            AgentId(1),
            ExperienceKind::Internal(InteractionKind::SocialApproach),
            &ExperienceTarget::Agent(AgentId(9)),
            &population,
            &mut ledger,
            1,
        );
        assert!((ledger.energy() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_aggressive_defense_of_held_place() {
        let mut engine = engine();
        let cave = GridCell::new(20, 20);
        engine.set_strength(AgentId(3), BoundaryObject::Place(cave), 0.9);
        let population = Population::from_views(vec![
            view(1, 10.0, 20.0),
            view(2, 12.0, 20.0),
            view(3, 20.0, 20.0),
        ]);
        let mut ledger = CoherenceLedger::new();

        for actor in [AgentId(1), AgentId(2)] {
            let result = engine.check_interaction(
                actor,
                &ExperienceTarget::Location(cave),
                InteractionKind::TerritoryEnter,
                &population,
                &mut ledger,
                5,
            );
            assert!(!result.allowed);
            assert_eq!(result.defense(), Some(DefenseResponse::AggressiveDefense));
        }

        let violations = engine.violations_at(&BoundaryObject::Place(cave));
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| !v.resolved && v.protector == AgentId(3)));
    }

    #[test]
    fn test_escalation_levels() {
        assert_eq!(escalate(0.9, 0), (DefenseResponse::AggressiveDefense, false));
        assert_eq!(escalate(0.45, 3), (DefenseResponse::AggressiveDefense, false));
        assert_eq!(escalate(0.6, 0), (DefenseResponse::FirmWarning, false));
        assert_eq!(escalate(0.45, 1), (DefenseResponse::MildConcern, true));
    }

    #[test]
    fn test_distant_or_dead_protectors_ignored() {
        let mut engine = engine();
        let cave = GridCell::new(0, 0);
        engine.set_strength(AgentId(2), BoundaryObject::Place(cave), 0.9);
        engine.set_strength(AgentId(3), BoundaryObject::Place(cave), 0.9);
        let mut dead = view(3, 1.0, 0.0);
        dead.alive = false;
        let population = Population::from_views(vec![view(1, 0.0, 0.0), view(2, 50.0, 0.0), dead]);
        let mut ledger = CoherenceLedger::new();

        let result = engine.check_interaction(
            AgentId(1),
            &ExperienceTarget::Location(cave),
            InteractionKind::TerritoryEnter,
            &population,
            &mut ledger,
            1,
        );
        assert!(result.allowed);
        assert_eq!(result.response, InteractionResponse::Neutral);
    }

    #[test]
    fn test_inner_target_is_cooperative() {
        let mut engine = engine();
        let cave = GridCell::new(0, 0);
        engine.set_strength(AgentId(1), BoundaryObject::Place(cave), 0.5);
        engine.set_strength(AgentId(2), BoundaryObject::Place(cave), 0.9);
        let population = Population::from_views(vec![view(1, 0.0, 0.0), view(2, 1.0, 0.0)]);
        let mut ledger = CoherenceLedger::new();

        let result = engine.check_interaction(
            AgentId(1),
            &ExperienceTarget::Location(cave),
            InteractionKind::TerritoryEnter,
            &population,
            &mut ledger,
            1,
        );
        assert!(result.allowed);
        assert_eq!(result.response, InteractionResponse::Cooperative { bonus: 0.2 });
    }

    #[test]
    fn test_meat_sharing_and_care_integration() {
        let mut engine = engine();
        engine.integrate_meat_sharing(AgentId(1), AgentId(2), 40);
        let person = |id| BoundaryObject::Person(AgentId(id));
        assert!((engine.strength(AgentId(1), &person(2)) - 0.7).abs() < 1e-6);
        assert!((engine.strength(AgentId(2), &person(1)) - 0.7).abs() < 1e-6);
        let meat = BoundaryObject::Resource("shared_meat_40".into());
        assert!(engine.boundary(AgentId(2)).unwrap().contains(&meat));

        engine.integrate_care(AgentId(4), AgentId(5));
        assert!((engine.strength(AgentId(5), &person(4)) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_meat_from_a_distrusted_giver_keeps_them_outside() {
        let mut engine = engine();
        let population = Population::from_views(vec![view(1, 0.0, 0.0), view(2, 90.0, 90.0)]);
        let mut ledger = CoherenceLedger::new();
        let giver = BoundaryObject::Person(AgentId(1));
        for tick in 0..4 {
            engine.process_experience(
                AgentId(2),
                ExperienceKind::ResourceTheft,
                &ExperienceTarget::Agent(AgentId(1)),
                &population,
                &mut ledger,
                tick,
            );
        }
        assert_eq!(engine.strength(AgentId(2), &giver), -1.0);

        engine.integrate_meat_sharing(AgentId(1), AgentId(2), 10);
        let strength = engine.strength(AgentId(2), &giver);
        assert!((strength + 0.8).abs() < 1e-6);
        assert!(!engine.boundary(AgentId(2)).unwrap().contains(&giver));

        // the giver's side starts fresh and crosses the expansion threshold
        let receiver = BoundaryObject::Person(AgentId(2));
        assert!(engine.boundary(AgentId(1)).unwrap().contains(&receiver));
        let boundary = engine.boundary(AgentId(2)).unwrap();
        for person in &boundary.people {
            assert!(engine.strength(AgentId(2), &BoundaryObject::Person(*person)) > 0.2);
        }
    }

    #[test]
    fn test_trust_sync_hysteresis() {
        let mut engine = engine();
        let person = BoundaryObject::Person(AgentId(2));
        engine.sync_trust(AgentId(1), AgentId(2), 0.9);
        assert!(engine.boundary(AgentId(1)).unwrap().contains(&person));
        // 0.3 is between the thresholds: membership kept
        engine.sync_trust(AgentId(1), AgentId(2), 0.6);
        assert!(engine.boundary(AgentId(1)).unwrap().contains(&person));
        engine.sync_trust(AgentId(1), AgentId(2), 0.2);
        assert!(!engine.boundary(AgentId(1)).unwrap().contains(&person));
    }

    #[test]
    fn test_analysis_counts_living_only() {
        let mut engine = engine();
        engine.integrate_hunt_group(HuntGroupId(1), &[AgentId(1), AgentId(2), AgentId(3)], 10);
        engine.set_strength(AgentId(4), BoundaryObject::Place(GridCell::new(0, 0)), 0.9);
        let _ = engine.check_interaction(
            AgentId(5),
            &ExperienceTarget::Location(GridCell::new(0, 0)),
            InteractionKind::TerritoryEnter,
            &Population::from_views(vec![view(4, 0.0, 0.0), view(5, 1.0, 0.0)]),
            &mut CoherenceLedger::new(),
            11,
        );

        let mut dead = view(3, 0.0, 0.0);
        dead.alive = false;
        let population = Population::from_views(vec![view(1, 0.0, 0.0), view(2, 0.0, 0.0), dead]);
        let analysis = engine.analysis(&population);

        assert_eq!(analysis.individual_boundaries.len(), 2);
        assert_eq!(analysis.individual_boundaries[&1].inner_people, 2);
        assert_eq!(analysis.collective_boundaries.len(), 1);
        assert_eq!(analysis.collective_boundaries[0].members, vec![1, 2]);
        assert_eq!(analysis.violation_count, 1);
        assert_eq!(analysis.external_conflicts, 1);
    }

    #[test]
    fn test_clarity_empty_is_zero() {
        assert_eq!(SubjectiveBoundary::default().clarity(), 0.0);
    }
}

//! Environment collaborator
//!
//! The decision loop only consumes feedback from the world: how much
//! pressure the surroundings exert, how scarce food is, and the seasonal
//! modifiers. `VillageEnvironment` is the default map used by the runner
//! and the tests.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use village_events::{Season, SeasonClock};

use crate::components::{GridCell, Knowledge, Position, Site, SiteKind};
use crate::config::EnvironmentConfig;
use crate::movement::distance;

/// Radius used to judge local food scarcity
pub const SCARCITY_RADIUS: f32 = 25.0;

/// Seasonal multipliers and stresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalModifiers {
    pub season: Season,
    pub berry_abundance: f32,
    pub prey_activity: f32,
    pub water_availability: f32,
    pub temperature_stress: f32,
    pub exploration_bonus: f32,
    pub social_gathering_bonus: f32,
}

impl SeasonalModifiers {
    /// Modifiers for a season at `progress` (0..1) through it
    pub fn for_season(season: Season, progress: f32) -> Self {
        let p = progress.clamp(0.0, 1.0);
        match season {
            Season::Spring => Self {
                season,
                berry_abundance: 0.8 + p * 0.4,
                prey_activity: 0.8 + p * 0.4,
                water_availability: 1.2,
                temperature_stress: 0.0,
                exploration_bonus: 0.3,
                social_gathering_bonus: 0.2,
            },
            Season::Summer => Self {
                season,
                berry_abundance: 1.5,
                prey_activity: 1.5,
                water_availability: 1.3,
                temperature_stress: 0.0,
                exploration_bonus: 0.3,
                social_gathering_bonus: 0.5,
            },
            Season::Autumn => Self {
                season,
                berry_abundance: 1.0 - p * 0.3,
                prey_activity: 0.9 - p * 0.2,
                water_availability: 0.9 + p * 0.2,
                temperature_stress: 0.05,
                exploration_bonus: 0.2,
                social_gathering_bonus: 0.4,
            },
            Season::Winter => Self {
                season,
                berry_abundance: 1.0,
                prey_activity: 1.0,
                water_availability: 0.8,
                temperature_stress: 0.0,
                exploration_bonus: 0.0,
                social_gathering_bonus: 0.6,
            },
        }
    }
}

/// What the environment tells an agent each turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentFeedback {
    pub environmental_pressure: f32,
    /// 0.0 (plenty) to 1.0 (nothing nearby)
    pub resource_scarcity: f32,
    pub seasonal: SeasonalModifiers,
}

/// Source of environmental feedback and site lookups
pub trait Environment: Send + Sync {
    fn feedback(&self, position: Position, tick: u64) -> EnvironmentFeedback;

    /// Every site within `radius` of `position`
    fn sites_within(&self, position: Position, radius: f32) -> Vec<Site>;

    /// Whether a site still exists
    fn has_site(&self, site: &Site) -> bool;

    /// Number of existing sites of a kind
    fn site_count(&self, kind: SiteKind) -> usize;

    /// Probability that foraging at a berry site succeeds
    fn forage_chance(&self, tick: u64) -> f32;

    fn world_size(&self) -> f32;

    /// Nearest site the agent knows about that still exists
    fn nearest_known(
        &self,
        knowledge: &Knowledge,
        kind: SiteKind,
        position: Position,
    ) -> Option<GridCell> {
        knowledge
            .sites(kind)
            .filter(|cell| self.has_site(&Site::new(kind, *cell)))
            .min_by(|a, b| {
                distance(position, a.to_position())
                    .total_cmp(&distance(position, b.to_position()))
                    .then_with(|| a.cmp(b))
            })
    }
}

/// Resource: the environment collaborator used by the turn loop
#[derive(Resource)]
pub struct EnvironmentHandle(pub Box<dyn Environment>);

impl EnvironmentHandle {
    pub fn new(environment: impl Environment + 'static) -> Self {
        Self(Box::new(environment))
    }
}

/// A square map with fixed resource sites and a four-season cycle
#[derive(Debug, Clone)]
pub struct VillageEnvironment {
    size: f32,
    sites: Vec<Site>,
    calendar: SeasonClock,
}

impl VillageEnvironment {
    pub fn new(size: f32, sites: Vec<Site>, calendar: SeasonClock) -> Self {
        Self {
            size,
            sites,
            calendar,
        }
    }

    /// Scatter sites over the map using the simulation RNG
    pub fn generate(
        size: f32,
        counts: &EnvironmentConfig,
        calendar: SeasonClock,
        rng: &mut impl Rng,
    ) -> Self {
        let mut sites = Vec::new();
        let plan = [
            (SiteKind::Water, counts.water_sites),
            (SiteKind::Berries, counts.berry_sites),
            (SiteKind::Cave, counts.cave_sites),
            (SiteKind::HuntingGround, counts.hunting_grounds),
        ];
        let limit = size.max(1.0) as i32;
        for (kind, count) in plan {
            for _ in 0..count {
                let cell = GridCell::new(rng.gen_range(0..=limit), rng.gen_range(0..=limit));
                sites.push(Site::new(kind, cell));
            }
        }
        Self::new(size, sites, calendar)
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn seasonal(&self, tick: u64) -> SeasonalModifiers {
        SeasonalModifiers::for_season(
            self.calendar.season_at(tick),
            self.calendar.progress_at(tick),
        )
    }
}

impl Environment for VillageEnvironment {
    fn feedback(&self, position: Position, tick: u64) -> EnvironmentFeedback {
        let seasonal = self.seasonal(tick);
        let nearby_berries = self
            .sites
            .iter()
            .filter(|s| s.kind == SiteKind::Berries)
            .filter(|s| distance(position, s.cell.to_position()) <= SCARCITY_RADIUS)
            .count();
        let supply = nearby_berries as f32 * seasonal.berry_abundance / 3.0;
        let resource_scarcity = (1.0 - supply.min(1.0)).clamp(0.0, 1.0);
        let dryness = (1.0 - seasonal.water_availability).max(0.0);
        let environmental_pressure =
            (seasonal.temperature_stress + resource_scarcity * 0.5 + dryness * 0.5).clamp(0.0, 2.0);

        EnvironmentFeedback {
            environmental_pressure,
            resource_scarcity,
            seasonal,
        }
    }

    fn sites_within(&self, position: Position, radius: f32) -> Vec<Site> {
        self.sites
            .iter()
            .filter(|s| distance(position, s.cell.to_position()) <= radius)
            .copied()
            .collect()
    }

    fn has_site(&self, site: &Site) -> bool {
        self.sites.contains(site)
    }

    fn site_count(&self, kind: SiteKind) -> usize {
        self.sites.iter().filter(|s| s.kind == kind).count()
    }

    fn forage_chance(&self, tick: u64) -> f32 {
        (0.7 * self.seasonal(tick).berry_abundance).clamp(0.1, 0.95)
    }

    fn world_size(&self) -> f32 {
        self.size
    }
}

//! World Components
//!
//! Positions, resource sites, per-agent site knowledge and the world clock.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use village_events::{Season, SeasonClock};

/// Component: An agent's continuous position on the map
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The grid cell this position falls in
    pub fn cell(&self) -> GridCell {
        GridCell::new(self.x.round() as i32, self.y.round() as i32)
    }
}

/// Integer map coordinate used to identify places
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_position(self) -> Position {
        Position::new(self.x as f32, self.y as f32)
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "location_{}_{}", self.x, self.y)
    }
}

/// Kinds of resource sites on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    Water,
    Berries,
    Cave,
    HuntingGround,
}

impl SiteKind {
    pub fn all() -> &'static [SiteKind] {
        &[
            SiteKind::Water,
            SiteKind::Berries,
            SiteKind::Cave,
            SiteKind::HuntingGround,
        ]
    }
}

/// A resource site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub kind: SiteKind,
    pub cell: GridCell,
}

impl Site {
    pub fn new(kind: SiteKind, cell: GridCell) -> Self {
        Self { kind, cell }
    }
}

/// Identifier of a hunt group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HuntGroupId(pub u32);

/// Identifier of a claimed territory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerritoryId(pub u32);

/// Component: Sites an agent has discovered, plus how often it rested at each cave
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Knowledge {
    known: BTreeMap<SiteKind, BTreeSet<GridCell>>,
    cave_rests: BTreeMap<GridCell, u32>,
}

impl Knowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a site. Returns true if it was new.
    pub fn learn(&mut self, site: Site) -> bool {
        self.known.entry(site.kind).or_default().insert(site.cell)
    }

    pub fn knows(&self, site: &Site) -> bool {
        self.known
            .get(&site.kind)
            .is_some_and(|cells| cells.contains(&site.cell))
    }

    pub fn count(&self, kind: SiteKind) -> usize {
        self.known.get(&kind).map_or(0, |cells| cells.len())
    }

    pub fn sites(&self, kind: SiteKind) -> impl Iterator<Item = GridCell> + '_ {
        self.known.get(&kind).into_iter().flatten().copied()
    }

    /// Closest known site of a kind, ties broken by cell order
    pub fn nearest(&self, kind: SiteKind, from: Position) -> Option<GridCell> {
        self.sites(kind).min_by(|a, b| {
            let da = crate::movement::distance(from, a.to_position());
            let db = crate::movement::distance(from, b.to_position());
            da.total_cmp(&db).then_with(|| a.cmp(b))
        })
    }

    /// Count a rest at a cave, returning the new total
    pub fn record_rest(&mut self, cave: GridCell) -> u32 {
        let count = self.cave_rests.entry(cave).or_insert(0);
        *count += 1;
        *count
    }

    pub fn rests_at(&self, cave: GridCell) -> u32 {
        self.cave_rests.get(&cave).copied().unwrap_or(0)
    }
}

/// Resource: Global simulation clock
#[derive(Resource, Debug, Clone, Default)]
pub struct SimClock {
    pub current_tick: u64,
    pub calendar: SeasonClock,
}

impl SimClock {
    pub fn new(season_length: u64) -> Self {
        Self {
            current_tick: 0,
            calendar: SeasonClock::new(season_length),
        }
    }

    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    pub fn season(&self) -> Season {
        self.calendar.season_at(self.current_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knowledge_learning() {
        let mut knowledge = Knowledge::new();
        let spring = Site::new(SiteKind::Water, GridCell::new(4, 4));
        assert!(knowledge.learn(spring));
        assert!(!knowledge.learn(spring));
        assert!(knowledge.knows(&spring));
        assert_eq!(knowledge.count(SiteKind::Water), 1);
        assert_eq!(knowledge.count(SiteKind::Cave), 0);
    }

    #[test]
    fn test_nearest_known_site() {
        let mut knowledge = Knowledge::new();
        knowledge.learn(Site::new(SiteKind::Berries, GridCell::new(10, 0)));
        knowledge.learn(Site::new(SiteKind::Berries, GridCell::new(2, 1)));

        let nearest = knowledge.nearest(SiteKind::Berries, Position::new(0.0, 0.0));
        assert_eq!(nearest, Some(GridCell::new(2, 1)));
        assert_eq!(knowledge.nearest(SiteKind::Water, Position::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_cave_rests() {
        let mut knowledge = Knowledge::new();
        let cave = GridCell::new(1, 1);
        assert_eq!(knowledge.record_rest(cave), 1);
        assert_eq!(knowledge.record_rest(cave), 2);
        assert_eq!(knowledge.rests_at(cave), 2);
        assert_eq!(knowledge.rests_at(GridCell::new(0, 0)), 0);
    }

    #[test]
    fn test_clock_season() {
        let mut clock = SimClock::new(10);
        for _ in 0..25 {
            clock.advance_tick();
        }
        assert_eq!(clock.season(), Season::Autumn);
    }
}

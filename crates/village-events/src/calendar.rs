//! Seasonal Calendar
//!
//! Maps the monotonic tick counter onto a four-season cycle.
//!
//! # Example
//!
//! ```
//! use village_events::{Season, SeasonClock};
//!
//! let clock = SeasonClock::new(50);
//! assert_eq!(clock.season_at(0), Season::Spring);
//! assert_eq!(clock.season_at(120), Season::Autumn);
//! assert_eq!(clock.year_at(200), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default number of ticks in one season.
pub const DEFAULT_SEASON_LENGTH: u64 = 50;

/// Season of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Returns the next season in order.
    pub fn next(self) -> Self {
        match self {
            Season::Spring => Season::Summer,
            Season::Summer => Season::Autumn,
            Season::Autumn => Season::Winter,
            Season::Winter => Season::Spring,
        }
    }

    /// Autumn and winter are the lean half of the year.
    pub fn is_lean(self) -> bool {
        matches!(self, Season::Autumn | Season::Winter)
    }

    fn from_index(index: u64) -> Self {
        match index % 4 {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::Spring => write!(f, "spring"),
            Season::Summer => write!(f, "summer"),
            Season::Autumn => write!(f, "autumn"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

/// Error returned when a season name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid season: '{0}'")]
pub struct ParseSeasonError(pub String);

impl FromStr for Season {
    type Err = ParseSeasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            _ => Err(ParseSeasonError(s.to_string())),
        }
    }
}

/// Tick-to-season mapping with a fixed season length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonClock {
    pub season_length: u64,
}

impl Default for SeasonClock {
    fn default() -> Self {
        Self::new(DEFAULT_SEASON_LENGTH)
    }
}

impl SeasonClock {
    /// A zero length is treated as one tick per season.
    pub fn new(season_length: u64) -> Self {
        Self {
            season_length: season_length.max(1),
        }
    }

    pub fn season_at(&self, tick: u64) -> Season {
        Season::from_index(tick / self.season_length)
    }

    /// Fraction of the current season already elapsed, in [0, 1).
    pub fn progress_at(&self, tick: u64) -> f32 {
        (tick % self.season_length) as f32 / self.season_length as f32
    }

    /// Years are numbered from 1.
    pub fn year_at(&self, tick: u64) -> u64 {
        tick / (self.season_length * 4) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_cycle() {
        let mut season = Season::Spring;
        for _ in 0..4 {
            season = season.next();
        }
        assert_eq!(season, Season::Spring);
        assert!(Season::Winter.is_lean());
        assert!(!Season::Summer.is_lean());
    }

    #[test]
    fn test_season_parse() {
        assert_eq!("Autumn".parse::<Season>(), Ok(Season::Autumn));
        assert!("monsoon".parse::<Season>().is_err());
    }

    #[test]
    fn test_clock_progress() {
        let clock = SeasonClock::new(50);
        assert_eq!(clock.season_at(49), Season::Spring);
        assert_eq!(clock.season_at(50), Season::Summer);
        assert_eq!(clock.season_at(199), Season::Winter);
        assert_eq!(clock.season_at(200), Season::Spring);
        assert!((clock.progress_at(75) - 0.5).abs() < 1e-6);
        assert_eq!(clock.year_at(199), 1);
    }

    #[test]
    fn test_zero_length_clock() {
        let clock = SeasonClock::new(0);
        assert_eq!(clock.season_at(1), Season::Summer);
    }
}

//! Shared record types for the village simulation.
//!
//! This crate contains pure data structures with no simulation logic:
//! the seasonal calendar, per-turn step reports, boundary analysis
//! summaries and the events written to the JSONL log.

pub mod calendar;
pub mod event;
pub mod report;

pub use calendar::{ParseSeasonError, Season, SeasonClock, DEFAULT_SEASON_LENGTH};
pub use event::*;
pub use report::*;

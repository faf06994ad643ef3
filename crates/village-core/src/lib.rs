//! Meaning-Pressure Village Library
//!
//! Agents in a small prehistoric village decide each turn by weighing need
//! pressure against learned coherence. Exploration, trust, hunting, care,
//! territory and subjective boundaries all feed back into those decisions.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod environment;
pub mod events;
pub mod movement;
pub mod registry;
pub mod setup;
pub mod systems;

pub use components::*;
pub use config::{ConfigError, SimConfig};
pub use setup::{build_schedule, build_world, run_ticks};
pub use systems::{boundary_analysis, step};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

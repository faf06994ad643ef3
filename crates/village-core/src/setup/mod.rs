//! World Setup
//!
//! World initialization, villager spawning and the tick schedule.

pub mod agents;
pub mod world;

pub use agents::*;
pub use world::*;

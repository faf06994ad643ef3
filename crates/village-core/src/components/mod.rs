//! ECS components shared by the decision systems.

pub mod agent;
pub mod world;

pub use agent::*;
pub use world::*;

//! ECS Systems
//!
//! Per-tick systems plus the decision subsystems an agent turn runs through:
//! coherence, exploration, priority, trust, boundary, hunting, care and
//! territory.

pub mod boundary;
pub mod care;
pub mod coherence;
pub mod exploration;
pub mod hunting;
pub mod perception;
pub mod physiology;
pub mod priority;
pub mod territory;
pub mod trust;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used systems
pub use boundary::{
    boundary_analysis, BoundaryEngine, ExperienceKind, ExperienceTarget, InteractionKind,
};
pub use care::{advance_recovery, care_willingness};
pub use coherence::{Coherence, CoherenceLedger, NeedSamples};
pub use exploration::{Exploration, Transition};
pub use hunting::{decay_meat, HuntCoordinator, MeatStore, PreyKind};
pub use perception::{build_proximity_index, update_perception, Nearby, Population, ProximityIndex};
pub use physiology::{apply_physiological_drift, reap_dead, update_clock};
pub use priority::{rank, HuntMotivation, SelectorState};
pub use territory::TerritoryRegistry;
pub use trust::{decay_trust_memories, TrustLedger};
pub use turn::{run_agent_turns, step, TurnContext};

//! Event Types
//!
//! Records written to the append-only simulation log, one JSON object per line.

use serde::{Deserialize, Serialize};

use crate::report::StepReport;

/// Why an exploring agent returned to the settled mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversionCause {
    LifeCrisis,
    SettlementScore,
    SettlementCoherence,
    PressureFaded,
}

/// Protector response to a boundary violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseResponse {
    AggressiveDefense,
    FirmWarning,
    MildConcern,
}

impl DefenseResponse {
    /// The outcome a response leads to.
    pub fn outcome(self) -> DefenseOutcome {
        match self {
            DefenseResponse::AggressiveDefense => DefenseOutcome::ForcedRetreat,
            DefenseResponse::FirmWarning => DefenseOutcome::NegotiationPossible,
            DefenseResponse::MildConcern => DefenseOutcome::Monitoring,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseOutcome {
    ForcedRetreat,
    NegotiationPossible,
    Monitoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Dehydration,
    Starvation,
}

/// A single logged occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEventKind {
    Step(StepReport),
    Leap {
        agent: u32,
        pressure: f32,
        intensity: f32,
        energy_after: f32,
    },
    Reversion {
        agent: u32,
        cause: ReversionCause,
        duration: u32,
    },
    HuntFormed {
        group: u32,
        leader: u32,
        members: Vec<u32>,
        prey: String,
    },
    HuntResolved {
        group: u32,
        success: bool,
        success_rate: f32,
        meat: f32,
        injured: Vec<u32>,
    },
    MeatShared {
        giver: u32,
        receiver: u32,
        amount: f32,
        trust_after: f32,
    },
    BoundaryViolation {
        violator: u32,
        protector: u32,
        target: String,
        response: DefenseResponse,
        supporters: Vec<u32>,
    },
    TerritoryClaimed {
        agent: u32,
        territory: u32,
        center: (i32, i32),
        radius: f32,
    },
    TerritoryJoined {
        agent: u32,
        territory: u32,
    },
    CareStarted {
        caregiver: u32,
        patient: u32,
    },
    Recovered {
        agent: u32,
        caregiver: Option<u32>,
    },
    Death {
        agent: u32,
        cause: DeathCause,
    },
}

/// Log line: the tick plus what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    #[serde(flatten)]
    pub kind: SimEventKind,
}

impl SimEvent {
    pub fn new(tick: u64, kind: SimEventKind) -> Self {
        Self { tick, kind }
    }

    /// Short name of the event variant, as written in the `type` field.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            SimEventKind::Step(_) => "step",
            SimEventKind::Leap { .. } => "leap",
            SimEventKind::Reversion { .. } => "reversion",
            SimEventKind::HuntFormed { .. } => "hunt_formed",
            SimEventKind::HuntResolved { .. } => "hunt_resolved",
            SimEventKind::MeatShared { .. } => "meat_shared",
            SimEventKind::BoundaryViolation { .. } => "boundary_violation",
            SimEventKind::TerritoryClaimed { .. } => "territory_claimed",
            SimEventKind::TerritoryJoined { .. } => "territory_joined",
            SimEventKind::CareStarted { .. } => "care_started",
            SimEventKind::Recovered { .. } => "recovered",
            SimEventKind::Death { .. } => "death",
        }
    }
}

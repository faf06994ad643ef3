//! Events
//!
//! Per-tick event buffer and the JSONL logger it is flushed into.

pub mod logger;

use bevy_ecs::prelude::*;
use village_events::{SimEvent, SimEventKind};

pub use logger::{flush_event_log, EventLogger, LogError};

/// Resource: events produced during the current tick
#[derive(Resource, Debug, Default)]
pub struct TickEvents {
    events: Vec<SimEvent>,
}

impl TickEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tick: u64, kind: SimEventKind) {
        self.events.push(SimEvent::new(tick, kind));
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Events of one type, by `SimEvent::type_name`
    pub fn of_type<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SimEvent> {
        self.events.iter().filter(move |e| e.type_name() == name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

//! Event Logger
//!
//! Append-only JSONL event logging. Every line carries a sequential event
//! id and the run id of the simulation that produced it.

use bevy_ecs::prelude::*;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;
use village_events::SimEvent;

use super::TickEvents;

/// Logging error type
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct LogLine<'a> {
    event_id: String,
    run_id: &'a str,
    #[serde(flatten)]
    event: &'a SimEvent,
}

/// Resource for logging events to a JSONL file
#[derive(Resource)]
pub struct EventLogger {
    writer: Option<BufWriter<File>>,
    run_id: String,
    event_count: u64,
    next_event_id: u64,
}

impl EventLogger {
    /// Create a new event logger writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self::null();
        logger.writer = Some(BufWriter::new(file));
        Ok(logger)
    }

    /// Create a logger that discards events (for testing)
    pub fn null() -> Self {
        Self {
            writer: None,
            run_id: Uuid::new_v4().to_string(),
            event_count: 0,
            next_event_id: 1,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Generate the next event ID
    pub fn next_id(&mut self) -> String {
        let id = format!("evt_{:08}", self.next_event_id);
        self.next_event_id += 1;
        id
    }

    /// Get the current event count
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Log an event to the file
    pub fn log(&mut self, event: &SimEvent) -> Result<(), LogError> {
        let event_id = self.next_id();
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let line = LogLine {
                event_id,
                run_id: &self.run_id,
                event,
            };
            let json = serde_json::to_string(&line)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    /// Log multiple events
    pub fn log_batch(&mut self, events: &[SimEvent]) -> Result<(), LogError> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> Result<(), LogError> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("failed to flush event logger: {}", e);
        }
    }
}

/// System: write this tick's events to the log and clear the buffer.
///
/// Without a logger the events are simply dropped.
pub fn flush_event_log(mut events: ResMut<TickEvents>, logger: Option<ResMut<EventLogger>>) {
    let drained = events.drain();
    let Some(mut logger) = logger else {
        return;
    };
    if let Err(e) = logger.log_batch(&drained) {
        tracing::warn!("event log write failed: {}", e);
    }
}

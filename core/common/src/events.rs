//! System-event sink contract.
//!
//! Progress and status events are consumed by an external collaborator
//! (websocket broadcast, admin UI). This module only defines the event
//! shape and a couple of local sinks.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Severity level of a system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A structured log/progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Event category, e.g. "migration".
    #[serde(rename = "type")]
    pub kind: String,
    pub level: EventLevel,
    pub message: String,
    /// Completion percentage (0-100) for progress events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl SystemEvent {
    /// Create a migration-category event.
    pub fn migration(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            kind: "migration".to_string(),
            level,
            message: message.into(),
            progress: None,
        }
    }

    /// Attach a completion percentage.
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }
}

/// Sink for system events.
pub trait SystemEventSink: Send + Sync {
    fn emit(&self, event: SystemEvent);
}

/// Sink that forwards events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl SystemEventSink for TracingEventSink {
    fn emit(&self, event: SystemEvent) {
        match event.level {
            EventLevel::Info | EventLevel::Success => {
                tracing::info!(kind = %event.kind, progress = ?event.progress, "{}", event.message)
            }
            EventLevel::Warning => {
                tracing::warn!(kind = %event.kind, "{}", event.message)
            }
            EventLevel::Error => {
                tracing::error!(kind = %event.kind, "{}", event.message)
            }
        }
    }
}

/// Sink that discards all events.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl SystemEventSink for NullEventSink {
    fn emit(&self, _event: SystemEvent) {}
}

/// Sink that records events in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<SystemEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<SystemEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SystemEventSink for MemoryEventSink {
    fn emit(&self, event: SystemEvent) {
        self.events.lock().unwrap().push(event);
    }
}

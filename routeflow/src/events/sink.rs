//! Event sink trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

use super::WorkflowEvent;

/// Receives workflow events.
///
/// Sinks must not fail or block: the orchestrator emits inline.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &WorkflowEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &WorkflowEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        let data = serde_json::to_string(event).unwrap_or_default();
        let event_type = event.event_type();
        let run_id = event.run_id();
        if matches!(event, WorkflowEvent::StageFailed { .. }) {
            warn!(event_type, %run_id, event_data = %data, "Event: {}", event_type);
        } else if self.level == Level::DEBUG {
            debug!(event_type, %run_id, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type, %run_id, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// Keeps events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<WorkflowEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(WorkflowEvent::event_type).collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        self.events.write().push(event.clone());
    }
}

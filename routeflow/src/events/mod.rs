//! Workflow events for observability.
//!
//! The orchestrator emits one event per state transition and per stage
//! boundary. Events carry the run id so overlapping log streams can be
//! told apart.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::Serialize;

use crate::stages::{StageId, StageResult};
use crate::workflow::{RunId, WorkflowState};

/// An event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The run moved between states.
    StateChanged {
        /// Run id.
        run_id: RunId,
        /// Previous state.
        from: WorkflowState,
        /// New state.
        to: WorkflowState,
    },
    /// A stage was launched.
    StageStarted {
        /// Run id.
        run_id: RunId,
        /// The stage.
        stage: StageId,
    },
    /// A stage succeeded.
    StageCompleted {
        /// Run id.
        run_id: RunId,
        /// The stage.
        stage: StageId,
        /// Wall-clock duration.
        duration_ms: u64,
    },
    /// A stage did not succeed.
    StageFailed {
        /// Run id.
        run_id: RunId,
        /// The stage.
        stage: StageId,
        /// The classified outcome.
        result: StageResult,
    },
}

impl WorkflowEvent {
    /// Dotted event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "workflow.state_changed",
            Self::StageStarted { .. } => "workflow.stage_started",
            Self::StageCompleted { .. } => "workflow.stage_completed",
            Self::StageFailed { .. } => "workflow.stage_failed",
        }
    }

    /// Run the event belongs to.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::StateChanged { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::StageFailed { run_id, .. } => *run_id,
        }
    }
}

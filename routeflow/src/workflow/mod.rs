//! Workflow orchestration.
//!
//! A run exports the delivery request to the pipeline input files, then
//! runs the geocode, travel-time and scenario stages strictly in order,
//! stopping at the first failure. Progress goes to the status store.

mod orchestrator;
mod state;

pub use orchestrator::{
    progress_message, WorkflowHandle, WorkflowOrchestrator, WorkflowOutcome, COMPLETED_MESSAGE,
    PROCESSING_ERROR_PREFIX, STARTING_MESSAGE,
};
pub use state::{RunId, WorkflowState};

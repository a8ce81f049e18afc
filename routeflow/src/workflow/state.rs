//! Workflow states and run identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::stages::StageId;

/// Identifies one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a workflow run.
///
/// `Idle → ExportingInput → Geocoding → RoutingTimes → GeneratingScenarios →
/// Completed`, with `Failed` reachable from every non-idle, non-terminal
/// state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Not started.
    #[default]
    Idle,
    /// Writing the pipeline input files.
    ExportingInput,
    /// Geocoding stage running.
    Geocoding,
    /// Travel-time stage running.
    RoutingTimes,
    /// Scenario stage running.
    GeneratingScenarios,
    /// All stages succeeded.
    Completed,
    /// The run stopped on a failure.
    Failed,
}

impl WorkflowState {
    /// The state in which a stage runs.
    #[must_use]
    pub fn for_stage(stage: StageId) -> Self {
        match stage {
            StageId::Geocode => Self::Geocoding,
            StageId::RouteTimes => Self::RoutingTimes,
            StageId::Scenarios => Self::GeneratingScenarios,
        }
    }

    /// The stage running in this state, if any.
    #[must_use]
    pub fn stage(self) -> Option<StageId> {
        match self {
            Self::Geocoding => Some(StageId::Geocode),
            Self::RoutingTimes => Some(StageId::RouteTimes),
            Self::GeneratingScenarios => Some(StageId::Scenarios),
            _ => None,
        }
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use WorkflowState::{
            Completed, ExportingInput, Failed, GeneratingScenarios, Geocoding, Idle, RoutingTimes,
        };
        match (self, next) {
            (Idle, ExportingInput)
            | (ExportingInput, Geocoding)
            | (Geocoding, RoutingTimes)
            | (RoutingTimes, GeneratingScenarios)
            | (GeneratingScenarios, Completed) => true,
            (from, Failed) => from != Idle && !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ExportingInput => "exporting_input",
            Self::Geocoding => "geocoding",
            Self::RoutingTimes => "routing_times",
            Self::GeneratingScenarios => "generating_scenarios",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_transitions() {
        let path = [
            WorkflowState::Idle,
            WorkflowState::ExportingInput,
            WorkflowState::Geocoding,
            WorkflowState::RoutingTimes,
            WorkflowState::GeneratingScenarios,
            WorkflowState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_stages() {
        assert!(!WorkflowState::Geocoding.can_transition_to(WorkflowState::GeneratingScenarios));
        assert!(!WorkflowState::ExportingInput.can_transition_to(WorkflowState::RoutingTimes));
        assert!(!WorkflowState::Idle.can_transition_to(WorkflowState::Geocoding));
    }

    #[test]
    fn test_failed_is_absorbing() {
        assert!(WorkflowState::ExportingInput.can_transition_to(WorkflowState::Failed));
        assert!(WorkflowState::RoutingTimes.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Idle.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Failed.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Failed.can_transition_to(WorkflowState::Geocoding));
        assert!(!WorkflowState::Completed.can_transition_to(WorkflowState::Failed));
    }

    #[test]
    fn test_stage_mapping() {
        for stage in StageId::ALL {
            assert_eq!(WorkflowState::for_stage(stage).stage(), Some(stage));
        }
        assert_eq!(WorkflowState::Completed.stage(), None);
        assert_eq!(WorkflowState::default(), WorkflowState::Idle);
    }

    #[test]
    fn test_run_id_unique_and_transparent() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{a}\""));
    }
}

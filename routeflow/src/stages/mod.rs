//! Pipeline stages and the runner capability.
//!
//! The three stages are opaque external collaborators. The orchestrator
//! only sees them through [`StageRunner`], so tests can swap in doubles.

mod process;
mod result;

pub use process::{ProcessStageRunner, StageCommand};
pub use result::{StageResult, API_LIMIT_EXIT_CODE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cancellation::CancellationToken;

/// One step of the fixed three-step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Address geocoding.
    Geocode,
    /// Travel-time retrieval.
    RouteTimes,
    /// Time-scenario generation.
    Scenarios,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::Geocode, Self::RouteTimes, Self::Scenarios];

    /// User-facing operation name, used as the prefix of failure messages.
    #[must_use]
    pub fn operation_name(self) -> &'static str {
        match self {
            Self::Geocode => "Geokodowanie",
            Self::RouteTimes => "Pobieranie czasów",
            Self::Scenarios => "Scenariusze czasowe",
        }
    }

    /// The stage that runs after this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Geocode => Some(Self::RouteTimes),
            Self::RouteTimes => Some(Self::Scenarios),
            Self::Scenarios => None,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geocode => write!(f, "geocode"),
            Self::RouteTimes => write!(f, "route_times"),
            Self::Scenarios => write!(f, "scenarios"),
        }
    }
}

/// Runs one pipeline stage to completion.
///
/// Implementations never panic on stage failure and never return an error:
/// every outcome is a [`StageResult`].
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Runs the stage and classifies the outcome.
    async fn run(&self, stage: StageId, cancel: &CancellationToken) -> StageResult;
}

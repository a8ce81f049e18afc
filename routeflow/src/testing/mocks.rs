//! Stage runner doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::stages::{StageId, StageResult, StageRunner};

/// A runner that returns a preset result per stage and records calls.
///
/// Stages without a preset result succeed.
#[derive(Debug, Default)]
pub struct ScriptedStageRunner {
    results: Mutex<HashMap<StageId, StageResult>>,
    calls: Mutex<Vec<StageId>>,
    delay: Option<Duration>,
}

impl ScriptedStageRunner {
    /// Creates a runner where every stage succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Sets the result for one stage.
    #[must_use]
    pub fn with_result(self, stage: StageId, result: StageResult) -> Self {
        self.results.lock().insert(stage, result);
        self
    }

    /// Makes one stage exit with the given code.
    #[must_use]
    pub fn with_exit_code(self, stage: StageId, code: i32) -> Self {
        self.with_result(stage, StageResult::from_exit_code(code))
    }

    /// Makes every stage take this long, honouring cancellation.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the stages invoked, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StageId> {
        self.calls.lock().clone()
    }

    /// Returns how often a stage was invoked.
    #[must_use]
    pub fn call_count(&self, stage: StageId) -> usize {
        self.calls.lock().iter().filter(|s| **s == stage).count()
    }

    /// Returns the total number of invocations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl StageRunner for ScriptedStageRunner {
    async fn run(&self, stage: StageId, cancel: &CancellationToken) -> StageResult {
        self.calls.lock().push(stage);

        if let Some(delay) = self.delay {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    return StageResult::Cancelled {
                        reason: cancel.reason().unwrap_or_default(),
                    };
                }
            }
        }

        self.results
            .lock()
            .get(&stage)
            .cloned()
            .unwrap_or(StageResult::Success)
    }
}

/// A runner that panics when the given stage runs.
#[derive(Debug)]
pub struct PanickingStageRunner {
    stage: StageId,
}

impl PanickingStageRunner {
    /// Creates a runner panicking on `stage`.
    #[must_use]
    pub fn new(stage: StageId) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl StageRunner for PanickingStageRunner {
    async fn run(&self, stage: StageId, _cancel: &CancellationToken) -> StageResult {
        assert!(stage != self.stage, "stage runner crashed in {stage}");
        StageResult::Success
    }
}

//! Sequences the three pipeline stages and reports progress.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use super::{RunId, WorkflowState};
use crate::cancellation::CancellationToken;
use crate::config::{PathConfig, RouteflowConfig};
use crate::errors::{Result, RouteflowError};
use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, WorkflowEvent};
use crate::request::{write_input_csv, write_vehicle_count, DeliveryRequest};
use crate::stages::{ProcessStageRunner, StageId, StageResult, StageRunner};
use crate::status::{FileStatusStore, StatusStore};

/// First progress message of a run.
pub const STARTING_MESSAGE: &str = "Rozpoczynanie przetwarzania - przygotowywanie danych...";

/// Terminal success message.
pub const COMPLETED_MESSAGE: &str = "Wszystkie etapy zakończone pomyślnie! Dane gotowe do pobrania.";

/// Prefix of setup and internal failure messages.
pub const PROCESSING_ERROR_PREFIX: &str = "Błąd podczas przetwarzania: ";

/// Progress message written before a stage starts.
#[must_use]
pub fn progress_message(stage: StageId) -> &'static str {
    match stage {
        StageId::Geocode => "Geokodowanie adresów - konwersja na współrzędne GPS...",
        StageId::RouteTimes => "Geokodowanie ukończone! Pobieranie czasów przejazdu z API...",
        StageId::Scenarios => "Pobieranie czasów ukończone! Generowanie scenariuszy czasowych...",
    }
}

/// Terminal result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcome {
    /// Run id.
    pub run_id: RunId,
    /// `Completed` or `Failed`.
    pub state: WorkflowState,
    /// The stage that failed, if a stage failed.
    pub failed_stage: Option<StageId>,
    /// The terminal status message, without prefix.
    pub message: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl WorkflowOutcome {
    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == WorkflowState::Completed
    }

    /// Run duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// Handle to a run started with [`WorkflowOrchestrator::spawn`].
#[derive(Debug)]
pub struct WorkflowHandle {
    run_id: RunId,
    cancel: Arc<CancellationToken>,
    join: JoinHandle<WorkflowOutcome>,
}

impl WorkflowHandle {
    /// Run id of the background run.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Requests cancellation. The running stage process is killed.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Returns true once the run has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to finish.
    pub async fn wait(self) -> Result<WorkflowOutcome> {
        self.join
            .await
            .map_err(|e| RouteflowError::Internal(format!("workflow task failed: {e}")))
    }
}

/// Tracks the current state of one run and reports transitions.
struct RunMachine<'a> {
    run_id: RunId,
    state: WorkflowState,
    events: &'a dyn EventSink,
}

impl RunMachine<'_> {
    fn advance(&mut self, to: WorkflowState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(RouteflowError::Internal(format!(
                "illegal workflow transition {} -> {to}",
                self.state
            )));
        }
        self.enter(to);
        Ok(())
    }

    /// Moves to `Failed`, reporting the transition unless already terminal.
    fn fail(&mut self) {
        if self.state.can_transition_to(WorkflowState::Failed) {
            self.enter(WorkflowState::Failed);
        } else {
            self.state = WorkflowState::Failed;
        }
    }

    fn enter(&mut self, to: WorkflowState) {
        info!(from = %self.state, %to, "Workflow state changed");
        self.events.emit(&WorkflowEvent::StateChanged {
            run_id: self.run_id,
            from: self.state,
            to,
        });
        self.state = to;
    }
}

/// Runs the geocode → travel-time → scenario pipeline for a request.
///
/// At most one run executes at a time: [`execute`](Self::execute) waits
/// for the run lock, [`spawn`](Self::spawn) rejects a submission while the
/// lock is held. All failures end up in the status store as `ERROR:`
/// values; nothing is raised to the caller once a run has started.
pub struct WorkflowOrchestrator {
    paths: PathConfig,
    runner: Arc<dyn StageRunner>,
    status: Arc<dyn StatusStore>,
    events: Arc<dyn EventSink>,
    run_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("paths", &self.paths)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl WorkflowOrchestrator {
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        paths: PathConfig,
        runner: Arc<dyn StageRunner>,
        status: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            paths,
            runner,
            status,
            events: Arc::new(NoOpEventSink),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates an orchestrator that runs stages as processes and keeps the
    /// status in the configured status file.
    #[must_use]
    pub fn from_config(config: &RouteflowConfig) -> Self {
        let runner = Arc::new(ProcessStageRunner::from_config(config));
        let status = Arc::new(FileStatusStore::new(config.paths.status_file_path()));
        Self::new(config.paths.clone(), runner, status)
            .with_event_sink(Arc::new(LoggingEventSink::default()))
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The status store runs report to.
    #[must_use]
    pub fn status_store(&self) -> &Arc<dyn StatusStore> {
        &self.status
    }

    /// Returns true while a run holds the run lock.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Runs the workflow to completion, waiting for any in-flight run first.
    pub async fn execute(&self, request: DeliveryRequest) -> WorkflowOutcome {
        let _guard = self.run_lock.lock().await;
        self.run_guarded(RunId::new(), &request, &CancellationToken::new())
            .await
    }

    /// Starts the workflow as a background task and returns immediately.
    ///
    /// Fails without starting anything if the request is invalid or another
    /// run is in progress.
    pub fn spawn(self: &Arc<Self>, request: DeliveryRequest) -> Result<WorkflowHandle> {
        request.validate()?;
        let guard = self
            .run_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| RouteflowError::RunInProgress)?;

        let run_id = RunId::new();
        let cancel = Arc::new(CancellationToken::new());
        let this = Arc::clone(self);
        let token = Arc::clone(&cancel);
        let join = tokio::spawn(async move {
            let _guard = guard;
            this.run_guarded(run_id, &request, &token).await
        });

        info!(%run_id, "Workflow submitted");
        Ok(WorkflowHandle {
            run_id,
            cancel,
            join,
        })
    }

    /// Runs one workflow, converting internal errors and panics into a
    /// failed outcome and an `ERROR:` status.
    async fn run_guarded(
        &self,
        run_id: RunId,
        request: &DeliveryRequest,
        cancel: &CancellationToken,
    ) -> WorkflowOutcome {
        let started_at = Utc::now();
        let span = info_span!("workflow", %run_id);

        async {
            info!(stops = request.stops.len(), "[START] Workflow started");
            let mut machine = RunMachine {
                run_id,
                state: WorkflowState::Idle,
                events: self.events.as_ref(),
            };

            let run = AssertUnwindSafe(self.run_pipeline(&mut machine, request, cancel))
                .catch_unwind()
                .await;

            let failure = match run {
                Ok(Ok(outcome)) => return outcome.finish(run_id, started_at),
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            error!(error = %failure, "[ERROR] Workflow aborted");
            machine.fail();
            let message = format!("{PROCESSING_ERROR_PREFIX}{failure}");
            self.status.write_error(&message).await;
            RunEnd::failed(None, message).finish(run_id, started_at)
        }
        .instrument(span)
        .await
    }

    async fn run_pipeline(
        &self,
        machine: &mut RunMachine<'_>,
        request: &DeliveryRequest,
        cancel: &CancellationToken,
    ) -> Result<RunEnd> {
        machine.advance(WorkflowState::ExportingInput)?;
        if let Err(e) = request.validate() {
            return Ok(self.fail(machine, None, e.to_string()).await);
        }
        if let Err(e) = self.export_inputs(request).await {
            error!(error = %e, "Exporting pipeline input failed");
            let message = format!("{PROCESSING_ERROR_PREFIX}{e}");
            return Ok(self.fail(machine, None, message).await);
        }
        info!("Pipeline input exported");
        self.status.write(STARTING_MESSAGE).await;

        for stage in StageId::ALL {
            machine.advance(WorkflowState::for_stage(stage))?;
            self.status.write(progress_message(stage)).await;

            let result = self.run_stage(machine.run_id, stage, cancel).await;
            if let Some(message) = result.failure_message(stage) {
                return Ok(self.fail(machine, Some(stage), message).await);
            }
        }

        machine.advance(WorkflowState::Completed)?;
        self.status.write_completed(COMPLETED_MESSAGE).await;
        info!("[END] Workflow completed");
        Ok(RunEnd::completed())
    }

    async fn run_stage(
        &self,
        run_id: RunId,
        stage: StageId,
        cancel: &CancellationToken,
    ) -> StageResult {
        if cancel.is_cancelled() {
            return StageResult::Cancelled {
                reason: cancel.reason().unwrap_or_default(),
            };
        }

        self.events.emit(&WorkflowEvent::StageStarted { run_id, stage });
        let started = Instant::now();
        let result = self.runner.run(stage, cancel).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if result.is_success() {
            info!(%stage, duration_ms, "{}: OK", stage.operation_name());
            self.events.emit(&WorkflowEvent::StageCompleted {
                run_id,
                stage,
                duration_ms,
            });
        } else {
            error!(%stage, outcome = result.kind(), exit_code = ?result.exit_code(), "Stage failed");
            self.events.emit(&WorkflowEvent::StageFailed {
                run_id,
                stage,
                result: result.clone(),
            });
        }
        result
    }

    async fn export_inputs(&self, request: &DeliveryRequest) -> Result<()> {
        write_input_csv(self.paths.data_file_path(), request).await?;
        write_vehicle_count(self.paths.config_file_path(), request.vehicle_count).await?;
        Ok(())
    }

    async fn fail(
        &self,
        machine: &mut RunMachine<'_>,
        stage: Option<StageId>,
        message: String,
    ) -> RunEnd {
        machine.fail();
        self.status.write_error(&message).await;
        RunEnd::failed(stage, message)
    }
}

/// How a run ended, before timestamps are attached.
struct RunEnd {
    state: WorkflowState,
    failed_stage: Option<StageId>,
    message: String,
}

impl RunEnd {
    fn completed() -> Self {
        Self {
            state: WorkflowState::Completed,
            failed_stage: None,
            message: COMPLETED_MESSAGE.to_string(),
        }
    }

    fn failed(failed_stage: Option<StageId>, message: String) -> Self {
        Self {
            state: WorkflowState::Failed,
            failed_stage,
            message,
        }
    }

    fn finish(self, run_id: RunId, started_at: DateTime<Utc>) -> WorkflowOutcome {
        WorkflowOutcome {
            run_id,
            state: self.state,
            failed_stage: self.failed_stage,
            message: self.message,
            started_at,
            ended_at: Utc::now(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::status::{MemoryStatusStore, MockStatusStore};
    use crate::testing::{paths_in, sample_request, ScriptedStageRunner};
    use pretty_assertions::assert_eq;

    fn orchestrator(
        dir: &std::path::Path,
        runner: Arc<ScriptedStageRunner>,
        status: Arc<dyn StatusStore>,
    ) -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(paths_in(dir), runner, status)
    }

    #[tokio::test]
    async fn test_status_writes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut status = MockStatusStore::new();
        let mut seq = mockall::Sequence::new();
        for expected in [
            STARTING_MESSAGE,
            progress_message(StageId::Geocode),
            progress_message(StageId::RouteTimes),
            progress_message(StageId::Scenarios),
        ] {
            status
                .expect_write()
                .withf(move |m| m == expected)
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }
        status
            .expect_write_completed()
            .withf(|m| m == COMPLETED_MESSAGE)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        status.expect_write_error().never();

        let runner = Arc::new(ScriptedStageRunner::succeeding());
        let outcome = orchestrator(dir.path(), runner, Arc::new(status))
            .execute(sample_request())
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_export_writes_input_files() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedStageRunner::succeeding());
        let orchestrator = orchestrator(dir.path(), runner, Arc::new(MemoryStatusStore::new()));

        orchestrator.execute(sample_request()).await;

        let data = std::fs::read_to_string(dir.path().join("wwwroot/dane_wejsciowe.csv")).unwrap();
        assert!(data.starts_with("Typ,Ulica,Numer,Miasto,KodPocztowy,OknoCzasoweOd,OknoCzasoweDo\n"));
        assert!(data.contains("Magazyn,Main St,1,Warsaw,00-001,,\n"));
        let config = std::fs::read_to_string(dir.path().join("wwwroot/config.csv")).unwrap();
        assert_eq!(config, "LiczbaPojazdow,2\n");
    }

    #[tokio::test]
    async fn test_export_failure_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the data directory should be makes the export fail.
        std::fs::write(dir.path().join("wwwroot"), "not a directory").unwrap();
        let runner = Arc::new(ScriptedStageRunner::succeeding());
        let status = Arc::new(MemoryStatusStore::new());
        let orchestrator = orchestrator(dir.path(), runner.clone(), status.clone());

        let outcome = orchestrator.execute(sample_request()).await;

        assert_eq!(outcome.state, WorkflowState::Failed);
        assert_eq!(outcome.failed_stage, None);
        assert!(status.read().await.starts_with("ERROR:Błąd podczas przetwarzania: "));
        assert_eq!(runner.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_stage_failure_reports_transition_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedStageRunner::succeeding().with_exit_code(StageId::RouteTimes, 3));
        let events = Arc::new(CollectingEventSink::new());
        let orchestrator = orchestrator(dir.path(), runner, Arc::new(MemoryStatusStore::new()))
            .with_event_sink(events.clone());

        let outcome = orchestrator.execute(sample_request()).await;

        let last = events.events().pop().unwrap();
        assert_eq!(
            last,
            WorkflowEvent::StateChanged {
                run_id: outcome.run_id,
                from: WorkflowState::RoutingTimes,
                to: WorkflowState::Failed,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_request_fails_before_stages() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedStageRunner::succeeding());
        let status = Arc::new(MemoryStatusStore::new());
        let orchestrator = orchestrator(dir.path(), runner.clone(), status.clone());

        let mut request = sample_request();
        request.depot.city.clear();
        let outcome = orchestrator.execute(request).await;

        assert_eq!(outcome.state, WorkflowState::Failed);
        assert_eq!(status.read().await, "ERROR:Błędy walidacji: Podaj miasto magazynu.");
        assert_eq!(runner.total_calls(), 0);
        assert!(!dir.path().join("wwwroot/dane_wejsciowe.csv").exists());
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedStageRunner::succeeding());
        let orchestrator = Arc::new(orchestrator(dir.path(), runner, Arc::new(MemoryStatusStore::new())));

        let mut request = sample_request();
        request.stops[0].address.postal_code.clear();
        let err = orchestrator.spawn(request).unwrap_err();
        assert!(matches!(err, RouteflowError::Validation(_)));
        assert!(!orchestrator.is_running());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "panic");
    }
}

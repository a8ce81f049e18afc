//! Stage runner backed by external processes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{StageId, StageResult, StageRunner};
use crate::cancellation::CancellationToken;
use crate::config::{ProcessingConfig, RouteflowConfig};

/// Number of trailing stderr lines logged when a stage fails.
const STDERR_TAIL_LINES: usize = 20;

/// How long output pipes may stay open after the stage has exited.
const PIPE_GRACE: Duration = Duration::from_millis(500);

type PipeBuffer = Arc<Mutex<Vec<u8>>>;

/// The command-line contract of one stage: `<executable> <script>` run in
/// `working_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    /// Interpreter or program to launch.
    pub executable: String,
    /// The single script-path argument.
    pub script: PathBuf,
    /// Working directory of the child.
    pub working_dir: PathBuf,
}

impl StageCommand {
    /// Creates a command.
    #[must_use]
    pub fn new(
        executable: impl Into<String>,
        script: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            script: script.into(),
            working_dir: working_dir.into(),
        }
    }
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

/// Runs each stage as `<executable> <script>` from the application root.
#[derive(Debug, Clone)]
pub struct ProcessStageRunner {
    processing: ProcessingConfig,
    root: PathBuf,
}

impl ProcessStageRunner {
    /// Creates a runner from processing settings and the application root.
    #[must_use]
    pub fn new(processing: ProcessingConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            processing,
            root: root.into(),
        }
    }

    /// Creates a runner from the full configuration.
    #[must_use]
    pub fn from_config(config: &RouteflowConfig) -> Self {
        Self::new(config.processing.clone(), config.paths.root())
    }

    /// Returns the command used for a stage.
    #[must_use]
    pub fn command_for(&self, stage: StageId) -> StageCommand {
        StageCommand::new(
            self.processing.executable.clone(),
            self.processing.scripts.for_stage(stage),
            self.root.clone(),
        )
    }

    /// Launches a command, waits for it and classifies the outcome.
    ///
    /// The child is killed if the configured timeout elapses or `cancel`
    /// fires. Stdout and stderr are drained concurrently with the wait;
    /// pipes still open shortly after the child exits are abandoned.
    pub async fn run_command(&self, command: &StageCommand, cancel: &CancellationToken) -> StageResult {
        let spawned = Command::new(&command.executable)
            .arg(&command.script)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    executable = %command.executable,
                    script = %command.script.display(),
                    error = %e,
                    "Failed to launch stage process"
                );
                return StageResult::launch_failure(e.to_string());
            }
        };

        let stdout_buf = PipeBuffer::default();
        let stderr_buf = PipeBuffer::default();
        let mut stdout = tokio::spawn(drain(child.stdout.take(), stdout_buf.clone()));
        let mut stderr = tokio::spawn(drain(child.stderr.take(), stderr_buf.clone()));
        let timeout = self.processing.process_timeout();

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            () = deadline(timeout) => Waited::TimedOut(timeout.unwrap_or_default()),
            () = cancel.cancelled() => Waited::Cancelled,
        };

        let grace = if matches!(waited, Waited::Exited(_)) {
            PIPE_GRACE
        } else {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill stage process");
            }
            Duration::ZERO
        };

        // Background grandchildren may hold the pipes open indefinitely.
        let drains = futures::future::join(&mut stdout, &mut stderr);
        if tokio::time::timeout(grace, drains).await.is_err() {
            debug!("Stage output pipes still open, abandoning them");
        }
        stdout.abort();
        stderr.abort();

        let stdout = String::from_utf8_lossy(&stdout_buf.lock()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf.lock()).into_owned();
        if !stdout.is_empty() {
            debug!(stdout = %stdout.trim_end(), "Stage output");
        }

        let result = match waited {
            Waited::Exited(Ok(status)) => match status.code() {
                Some(code) => StageResult::from_exit_code(code),
                None => StageResult::launch_failure(format!(
                    "proces zakończony bez kodu wyjścia ({status})"
                )),
            },
            Waited::Exited(Err(e)) => StageResult::launch_failure(e.to_string()),
            Waited::TimedOut(after) => StageResult::TimedOut { after },
            Waited::Cancelled => StageResult::Cancelled {
                reason: cancel.reason().unwrap_or_default(),
            },
        };

        if result.is_success() {
            info!("Stage process finished: OK");
        } else {
            warn!(
                outcome = result.kind(),
                exit_code = ?result.exit_code(),
                stderr = %tail(&stderr, STDERR_TAIL_LINES),
                "Stage process failed"
            );
        }
        result
    }
}

#[async_trait]
impl StageRunner for ProcessStageRunner {
    async fn run(&self, stage: StageId, cancel: &CancellationToken) -> StageResult {
        let command = self.command_for(stage);
        let span = info_span!(
            "stage_process",
            stage = %stage,
            executable = %command.executable,
            script = %command.script.display()
        );
        self.run_command(&command, cancel).instrument(span).await
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: PipeBuffer) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0_u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.lock().extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "Stage pipe read failed");
                break;
            }
        }
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;

    fn runner(root: &Path, timeout_ms: u64) -> ProcessStageRunner {
        let processing = ProcessingConfig {
            executable: "sh".to_string(),
            process_timeout_ms: timeout_ms,
            ..ProcessingConfig::default()
        };
        ProcessStageRunner::new(processing, root)
    }

    fn script(root: &Path, name: &str, body: &str) -> StageCommand {
        std::fs::write(root.join(name), body).unwrap();
        StageCommand::new("sh", name, root)
    }

    #[tokio::test]
    async fn test_exit_codes_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 10_000);
        let cancel = CancellationToken::new();

        let cases = [
            ("exit 0", StageResult::Success),
            ("exit 2", StageResult::ApiLimitExceeded),
            ("exit 17", StageResult::ApplicationError { exit_code: 17 }),
            ("echo boom >&2; exit 1", StageResult::ApplicationError { exit_code: 1 }),
        ];
        for (i, (body, expected)) in cases.into_iter().enumerate() {
            let command = script(dir.path(), &format!("s{i}.sh"), body);
            assert_eq!(runner.run_command(&command, &cancel).await, expected, "{body}");
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 10_000);
        let command = StageCommand::new("routeflow-no-such-binary", "x.py", dir.path());

        let result = runner.run_command(&command, &CancellationToken::new()).await;
        assert!(matches!(result, StageResult::LaunchFailure { .. }), "{result:?}");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 10_000);
        let command = script(dir.path(), "pwd.sh", "pwd > where.txt");

        let result = runner.run_command(&command, &CancellationToken::new()).await;
        assert_eq!(result, StageResult::Success);
        let written = std::fs::read_to_string(dir.path().join("where.txt")).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(Path::new(written.trim()), expected.as_path());
    }

    #[tokio::test]
    async fn test_large_output_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 10_000);
        let command = script(
            dir.path(),
            "loud.sh",
            "i=0; while [ $i -lt 20000 ]; do echo \"line $i\"; echo \"err $i\" >&2; i=$((i+1)); done",
        );

        let result = runner.run_command(&command, &CancellationToken::new()).await;
        assert_eq!(result, StageResult::Success);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 100);
        let command = script(dir.path(), "slow.sh", "exec sleep 5");

        let started = std::time::Instant::now();
        let result = runner.run_command(&command, &CancellationToken::new()).await;
        assert_eq!(
            result,
            StageResult::TimedOut {
                after: Duration::from_millis(100)
            }
        );
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cancel_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 0);
        let command = script(dir.path(), "slow.sh", "exec sleep 5");
        let cancel = Arc::new(CancellationToken::new());

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel("shutdown");
            })
        };

        let result = runner.run_command(&command, &cancel).await;
        canceller.await.unwrap();
        assert_eq!(
            result,
            StageResult::Cancelled {
                reason: "shutdown".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_background_child_does_not_hold_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 500);
        let command = script(dir.path(), "detach.sh", "echo started\nsleep 20 &\nexit 0");

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run_command(&command, &CancellationToken::new()),
        )
        .await
        .unwrap();

        assert_eq!(result, StageResult::Success);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_killed_by_signal_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 10_000);
        let command = script(dir.path(), "suicide.sh", "kill -9 $$");

        let result = runner.run_command(&command, &CancellationToken::new()).await;
        match result {
            StageResult::LaunchFailure { cause } => {
                assert!(cause.starts_with("proces zakończony bez kodu wyjścia"), "{cause}");
                assert!(cause.contains("signal"), "{cause}");
            }
            other => panic!("expected launch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stage_runner_uses_configured_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("PythonScripts")).unwrap();
        std::fs::write(dir.path().join("PythonScripts/route_times.py"), "exit 2").unwrap();
        let runner = runner(dir.path(), 10_000);

        assert_eq!(
            runner.command_for(StageId::RouteTimes).script,
            PathBuf::from("PythonScripts/route_times.py")
        );
        let result = runner.run(StageId::RouteTimes, &CancellationToken::new()).await;
        assert_eq!(result, StageResult::ApiLimitExceeded);
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }
}

//! Classified outcome of a single stage invocation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::StageId;

/// Exit code reserved for "rate limit exceeded" by the stage scripts.
pub const API_LIMIT_EXIT_CODE: i32 = 2;

/// Outcome of one stage invocation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageResult {
    /// Exit code 0.
    Success,
    /// Any nonzero exit code other than the rate-limit code.
    ApplicationError {
        /// The process exit code.
        exit_code: i32,
    },
    /// Exit code 2.
    ApiLimitExceeded,
    /// The process could not be started or awaited.
    LaunchFailure {
        /// Diagnostic text.
        cause: String,
    },
    /// The process exceeded the configured timeout and was killed.
    TimedOut {
        /// The timeout that elapsed.
        after: Duration,
    },
    /// The run was cancelled and the process killed.
    Cancelled {
        /// Cancellation reason.
        reason: String,
    },
}

impl StageResult {
    /// Classifies a process exit code.
    #[must_use]
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            API_LIMIT_EXIT_CODE => Self::ApiLimitExceeded,
            exit_code => Self::ApplicationError { exit_code },
        }
    }

    /// Creates a launch failure.
    #[must_use]
    pub fn launch_failure(cause: impl Into<String>) -> Self {
        Self::LaunchFailure {
            cause: cause.into(),
        }
    }

    /// Returns true for [`StageResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the exit code, when the process exited on its own.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Success => Some(0),
            Self::ApiLimitExceeded => Some(API_LIMIT_EXIT_CODE),
            Self::ApplicationError { exit_code } => Some(*exit_code),
            Self::LaunchFailure { .. } | Self::TimedOut { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// Short label used in logs and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ApplicationError { .. } => "application_error",
            Self::ApiLimitExceeded => "api_limit_exceeded",
            Self::LaunchFailure { .. } => "launch_failure",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// User-facing failure message for the status store.
    ///
    /// Returns `None` for success.
    #[must_use]
    pub fn failure_message(&self, stage: StageId) -> Option<String> {
        let op = stage.operation_name();
        let message = match self {
            Self::Success => return None,
            Self::ApiLimitExceeded => {
                format!("{op}: Przekroczono limit API - spróbuj za kilka minut")
            }
            Self::ApplicationError { exit_code } => {
                format!("{op}: Wystąpił błąd (kod: {exit_code})")
            }
            Self::LaunchFailure { cause } => format!("{op}: BŁĄD uruchamiania skryptu: {cause}"),
            Self::TimedOut { after } => {
                format!("{op}: Przekroczono limit czasu ({} s)", after.as_secs())
            }
            Self::Cancelled { reason } => format!("{op}: Przetwarzanie anulowane ({reason})"),
        };
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exit_code_classification() {
        assert_eq!(StageResult::from_exit_code(0), StageResult::Success);
        assert_eq!(StageResult::from_exit_code(2), StageResult::ApiLimitExceeded);
        assert_eq!(
            StageResult::from_exit_code(1),
            StageResult::ApplicationError { exit_code: 1 }
        );
        assert_eq!(
            StageResult::from_exit_code(-1),
            StageResult::ApplicationError { exit_code: -1 }
        );
    }

    #[test]
    fn test_exit_code_accessor() {
        assert_eq!(StageResult::from_exit_code(17).exit_code(), Some(17));
        assert_eq!(StageResult::launch_failure("x").exit_code(), None);
    }

    #[test]
    fn test_success_has_no_message() {
        assert!(StageResult::Success.failure_message(StageId::Geocode).is_none());
    }

    #[test]
    fn test_api_limit_message_for_every_stage() {
        for stage in StageId::ALL {
            let message = StageResult::ApiLimitExceeded.failure_message(stage).unwrap();
            assert!(message.starts_with(stage.operation_name()));
            assert!(message.contains("Przekroczono limit API"));
        }
    }

    #[test]
    fn test_application_error_message_contains_code() {
        let message = StageResult::from_exit_code(17)
            .failure_message(StageId::RouteTimes)
            .unwrap();
        assert_eq!(message, "Pobieranie czasów: Wystąpił błąd (kod: 17)");
    }

    #[test]
    fn test_launch_failure_message() {
        let message = StageResult::launch_failure("No such file or directory")
            .failure_message(StageId::Scenarios)
            .unwrap();
        assert_eq!(
            message,
            "Scenariusze czasowe: BŁĄD uruchamiania skryptu: No such file or directory"
        );
    }

    #[test]
    fn test_timeout_message() {
        let message = StageResult::TimedOut {
            after: Duration::from_secs(300),
        }
        .failure_message(StageId::Geocode)
        .unwrap();
        assert_eq!(message, "Geokodowanie: Przekroczono limit czasu (300 s)");
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(StageResult::from_exit_code(5)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "application_error", "exit_code": 5})
        );
    }
}

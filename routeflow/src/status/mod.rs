//! Workflow progress reporting.
//!
//! Exactly one status value exists per process. Every write replaces it;
//! readers poll it independently of the orchestrator. Reporting is
//! best-effort: store failures are logged and never abort a run.

mod poll;
mod store;

pub use poll::{poll_until_terminal, StatusSnapshot};
pub use store::{FileStatusStore, MemoryStatusStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a terminal failure.
pub const ERROR_PREFIX: &str = "ERROR:";

/// Prefix marking terminal success.
pub const COMPLETED_PREFIX: &str = "COMPLETED:";

/// Persistent single-slot status store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Replaces the current status. Failures are logged and swallowed.
    async fn write(&self, message: &str);

    /// Returns the current status, or an empty string if none or unreadable.
    async fn read(&self) -> String;

    /// Writes a terminal failure status.
    async fn write_error(&self, message: &str) {
        self.write(&format!("{ERROR_PREFIX}{message}")).await;
    }

    /// Writes a terminal success status.
    async fn write_completed(&self, message: &str) {
        self.write(&format!("{COMPLETED_PREFIX}{message}")).await;
    }

    /// Returns the parsed current status.
    async fn token(&self) -> StatusToken {
        StatusToken::parse(&self.read().await)
    }

    /// True if a run is in progress.
    async fn is_processing(&self) -> bool {
        self.token().await.is_processing()
    }

    /// True if the last run completed.
    async fn is_completed(&self) -> bool {
        self.token().await.is_completed()
    }

    /// True if the last run failed.
    async fn has_error(&self) -> bool {
        self.token().await.has_error()
    }
}

/// Parsed view of a raw status value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum StatusToken {
    /// Nothing written yet.
    Idle,
    /// A progress message.
    Processing(String),
    /// Terminal success.
    Completed(String),
    /// Terminal failure.
    Error(String),
}

impl StatusToken {
    /// Parses a raw status value by prefix.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix(ERROR_PREFIX) {
            Self::Error(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix(COMPLETED_PREFIX) {
            Self::Completed(rest.to_string())
        } else if raw.is_empty() {
            Self::Idle
        } else {
            Self::Processing(raw.to_string())
        }
    }

    /// Returns the message without any prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Processing(m) | Self::Completed(m) | Self::Error(m) => m,
        }
    }

    /// True for a non-empty value without a terminal prefix.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing(_))
    }

    /// True for a `COMPLETED:` value.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// True for an `ERROR:` value.
    #[must_use]
    pub fn has_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// True for either terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Error(_))
    }

    /// Short state name used by pollers.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing(_) => "processing",
            Self::Completed(_) => "completed",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for StatusToken {
    /// Formats the raw stored form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => Ok(()),
            Self::Processing(m) => write!(f, "{m}"),
            Self::Completed(m) => write!(f, "{COMPLETED_PREFIX}{m}"),
            Self::Error(m) => write!(f, "{ERROR_PREFIX}{m}"),
        }
    }
}

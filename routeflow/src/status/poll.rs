//! Status polling support for clients.

use serde::Serialize;
use std::time::Duration;

use super::{StatusStore, StatusToken};
use crate::cancellation::CancellationToken;

/// Shortest interval [`poll_until_terminal`] polls at.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Response body of the status poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// The raw status value, including any terminal prefix.
    pub status: String,
    /// `idle`, `processing`, `completed` or `error`.
    pub state: &'static str,
    /// Suggested delay before the next poll.
    pub poll_interval_ms: u64,
}

impl StatusSnapshot {
    /// Reads the store and builds a snapshot.
    pub async fn capture(store: &dyn StatusStore, poll_interval: Duration) -> Self {
        let status = store.read().await;
        let state = StatusToken::parse(&status).state_name();
        Self {
            status,
            state,
            poll_interval_ms: u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Polls the store until it holds a terminal status.
///
/// Returns `None` if the token is cancelled first. Intervals shorter than
/// one millisecond, including zero, are raised to one millisecond.
pub async fn poll_until_terminal(
    store: &dyn StatusStore,
    interval: Duration,
    cancel: &CancellationToken,
) -> Option<StatusToken> {
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return None,
            _ = ticker.tick() => {
                let token = store.token().await;
                if token.is_terminal() {
                    return Some(token);
                }
            }
        }
    }
}

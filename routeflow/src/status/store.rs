//! Status store implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::StatusStore;

/// Stores the status in a plain-text file.
///
/// Each write replaces the whole file. Concurrent readers may observe the
/// previous value; status is advisory.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    /// Creates a store backed by the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the status file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn try_write(&self, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, message).await
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn write(&self, message: &str) {
        match self.try_write(message).await {
            Ok(()) => info!(status = %message, "Status updated"),
            Err(e) => error!(
                path = %self.path.display(),
                status = %message,
                error = %e,
                "Failed to update status"
            ),
        }
    }

    async fn read(&self) -> String {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(status) => status,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read status");
                String::new()
            }
        }
    }
}

/// Keeps the status in memory.
///
/// Only the current value is kept unless the store was created with
/// [`MemoryStatusStore::recording`].
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    value: RwLock<String>,
    history: Option<RwLock<Vec<String>>>,
}

impl MemoryStatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that also records every write.
    #[must_use]
    pub fn recording() -> Self {
        Self {
            value: RwLock::default(),
            history: Some(RwLock::default()),
        }
    }

    /// Returns every value written so far, oldest first. Empty unless
    /// recording.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history
            .as_ref()
            .map(|h| h.read().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn write(&self, message: &str) {
        *self.value.write() = message.to_string();
        if let Some(history) = &self.history {
            history.write().push(message.to_string());
        }
        info!(status = %message, "Status updated");
    }

    async fn read(&self) -> String {
        self.value.read().clone()
    }
}

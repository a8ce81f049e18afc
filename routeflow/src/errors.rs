//! Error types for routeflow.
//!
//! Pipeline stage failures are *not* errors at this level: they are
//! [`StageResult`](crate::stages::StageResult) values. The types here cover
//! input validation, file handling, configuration and internal faults.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for routeflow operations.
#[derive(Debug, Error)]
pub enum RouteflowError {
    /// The delivery request violates an invariant.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A pipeline file could not be read or written.
    #[error("{0}")]
    FileProcessing(#[from] FileProcessingError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another workflow run currently holds the run lock.
    #[error("A workflow run is already in progress")]
    RunInProgress,

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RouteflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T, E = RouteflowError> = std::result::Result<T, E>;

/// Error raised when a delivery request fails validation.
///
/// All violations are collected, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Błędy walidacji: {}", .errors.join(", "))]
pub struct ValidationError {
    /// Individual violation messages.
    pub errors: Vec<String>,
}

impl ValidationError {
    /// Creates a validation error from a list of violations.
    #[must_use]
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}

/// Error raised when a pipeline file cannot be processed.
#[derive(Debug, Error)]
#[error("{message} ({})", .path.display())]
pub struct FileProcessingError {
    /// The file involved.
    pub path: PathBuf,
    /// What went wrong.
    pub message: String,
    /// Underlying IO error, if any.
    #[source]
    pub source: Option<std::io::Error>,
}

impl FileProcessingError {
    /// Creates a new file processing error.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an IO error for the given path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_joins_messages() {
        let err = ValidationError::new(vec![
            "Podaj miasto magazynu.".to_string(),
            "Podaj kod pocztowy magazynu.".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Błędy walidacji: Podaj miasto magazynu., Podaj kod pocztowy magazynu."
        );
    }

    #[test]
    fn test_validation_error_converts() {
        let err: RouteflowError = ValidationError::new(vec!["x".to_string()]).into();
        assert!(matches!(err, RouteflowError::Validation(_)));
        assert_eq!(err.to_string(), "Błędy walidacji: x");
    }

    #[test]
    fn test_file_processing_error_display() {
        let err = FileProcessingError::io(
            "/tmp/dane.csv",
            "Nie udało się zapisać pliku",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("Nie udało się zapisać pliku"));
        assert!(text.contains("/tmp/dane.csv"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn test_run_in_progress_display() {
        assert_eq!(
            RouteflowError::RunInProgress.to_string(),
            "A workflow run is already in progress"
        );
    }

    #[test]
    fn test_serde_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: RouteflowError = parse.unwrap_err().into();
        assert!(matches!(err, RouteflowError::Serialization(_)));
    }
}

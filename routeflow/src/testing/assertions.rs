//! Assertions on status values.

use crate::status::{StatusToken, COMPLETED_PREFIX, ERROR_PREFIX};

/// Asserts that the raw status is `COMPLETED:<message>`.
pub fn assert_status_completed(raw: &str, message: &str) {
    assert_eq!(
        raw,
        format!("{COMPLETED_PREFIX}{message}"),
        "Expected completed status"
    );
}

/// Asserts that the raw status is an `ERROR:` value containing `needle`.
pub fn assert_status_error_contains(raw: &str, needle: &str) {
    assert!(
        raw.starts_with(ERROR_PREFIX),
        "Expected an ERROR: status, got {raw:?}"
    );
    assert!(raw.contains(needle), "Expected {raw:?} to contain {needle:?}");
}

/// Asserts that the raw status is a plain progress message.
pub fn assert_status_processing(raw: &str) {
    assert!(
        StatusToken::parse(raw).is_processing(),
        "Expected a progress status, got {raw:?}"
    );
}

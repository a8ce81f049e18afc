//! Testing utilities for routeflow workflows.
//!
//! This module provides:
//! - Stage runner doubles with call recording
//! - Request and configuration fixtures
//! - Assertions on status values

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_status_completed, assert_status_error_contains, assert_status_processing,
};
pub use fixtures::{paths_in, sample_request, shell_config};
pub use mocks::{PanickingStageRunner, ScriptedStageRunner};

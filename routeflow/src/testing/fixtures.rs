//! Request and configuration fixtures.

use std::path::Path;

use crate::config::{PathConfig, RouteflowConfig};
use crate::request::{Address, DeliveryRequest, DeliveryStop};

/// Depot `Main St 1, Warsaw 00-001`, two vehicles, one stop
/// `Oak Ave 5, Krakow 30-001` without a time window.
#[must_use]
pub fn sample_request() -> DeliveryRequest {
    DeliveryRequest::new(Address::new("Main St", "1", "Warsaw", "00-001"), 2)
        .with_stop(DeliveryStop::new(Address::new("Oak Ave", "5", "Krakow", "30-001")))
}

/// Paths rooted at `root`.
#[must_use]
pub fn paths_in(root: &Path) -> PathConfig {
    PathConfig {
        root_dir: Some(root.to_path_buf()),
        ..PathConfig::default()
    }
}

/// A configuration rooted at `root` that runs stage scripts with `sh`.
#[must_use]
pub fn shell_config(root: &Path) -> RouteflowConfig {
    let mut config = RouteflowConfig::new().with_root_dir(root);
    config.processing = config.processing.with_executable("sh");
    config
}

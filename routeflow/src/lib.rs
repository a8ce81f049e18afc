//! # Routeflow
//!
//! Workflow orchestration for the delivery-route planning pipeline.
//!
//! A delivery request (depot, vehicle count, delivery stops) is exported to
//! CSV and then processed by three external stages run strictly in order:
//!
//! - **Geocoding**: converts addresses into GPS coordinates
//! - **Travel times**: fetches pairwise travel times from a routing API
//! - **Scenarios**: generates perturbed travel-time scenarios
//!
//! Progress is reported through a single status value that pollers read
//! independently of the run. Terminal values carry an `ERROR:` or
//! `COMPLETED:` prefix.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routeflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = RouteflowConfig::from_json_file("routeflow.json")?;
//! let orchestrator = Arc::new(WorkflowOrchestrator::from_config(&config));
//!
//! let handle = orchestrator.spawn(request)?;
//! let status = orchestrator.status_store().token().await;
//! let outcome = handle.wait().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod request;
pub mod stages;
pub mod status;
pub mod testing;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{
        LoggingConfig, PathConfig, ProcessingConfig, RouteflowConfig, ScriptConfig,
    };
    pub use crate::errors::{
        FileProcessingError, Result, RouteflowError, ValidationError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, WorkflowEvent,
    };
    pub use crate::request::{Address, DeliveryRequest, DeliveryStop, InputSummary};
    pub use crate::stages::{ProcessStageRunner, StageId, StageResult, StageRunner};
    pub use crate::status::{
        FileStatusStore, MemoryStatusStore, StatusSnapshot, StatusStore, StatusToken,
    };
    pub use crate::workflow::{
        RunId, WorkflowHandle, WorkflowOrchestrator, WorkflowOutcome, WorkflowState,
    };
}

//! Configuration for the routeflow workflow.
//!
//! All sections deserialize from JSON with per-field defaults, so a partial
//! file (or `{}`) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, RouteflowError};
use crate::stages::StageId;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteflowConfig {
    /// File locations.
    #[serde(default)]
    pub paths: PathConfig,
    /// External process settings.
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RouteflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RouteflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Sets the application root against which relative paths are resolved.
    #[must_use]
    pub fn with_root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.root_dir = Some(root.into());
        self
    }

    /// Checks values that deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.processing.executable.trim().is_empty() {
            return Err(RouteflowError::Config(
                "processing.executable must not be empty".to_string(),
            ));
        }
        if self.processing.status_check_interval_ms == 0 {
            return Err(RouteflowError::Config(
                "processing.status_check_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// File locations used by the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Application root. Defaults to the current working directory.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// Pipeline input file consumed by the geocoding stage.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Vehicle-count file.
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    /// Status token file.
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("wwwroot/dane_wejsciowe.csv")
}

fn default_config_file() -> PathBuf {
    PathBuf::from("wwwroot/config.csv")
}

fn default_status_file() -> PathBuf {
    PathBuf::from("wwwroot/processing_status.txt")
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            data_file: default_data_file(),
            config_file: default_config_file(),
            status_file: default_status_file(),
        }
    }
}

impl PathConfig {
    /// Returns the application root.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Resolves a path against the application root. Absolute paths pass through.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root().join(path)
    }

    /// Full path of the pipeline input file.
    #[must_use]
    pub fn data_file_path(&self) -> PathBuf {
        self.resolve(&self.data_file)
    }

    /// Full path of the vehicle-count file.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    /// Full path of the status file.
    #[must_use]
    pub fn status_file_path(&self) -> PathBuf {
        self.resolve(&self.status_file)
    }
}

/// External process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Interpreter used to run every stage script.
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Script path per stage.
    #[serde(default)]
    pub scripts: ScriptConfig,
    /// Per-stage timeout in milliseconds. `0` disables the timeout.
    #[serde(default = "default_process_timeout_ms")]
    pub process_timeout_ms: u64,
    /// Suggested status poll interval for clients.
    #[serde(default = "default_status_check_interval_ms")]
    pub status_check_interval_ms: u64,
}

fn default_executable() -> String {
    "python".to_string()
}

fn default_process_timeout_ms() -> u64 {
    300_000
}

fn default_status_check_interval_ms() -> u64 {
    2_000
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            scripts: ScriptConfig::default(),
            process_timeout_ms: default_process_timeout_ms(),
            status_check_interval_ms: default_status_check_interval_ms(),
        }
    }
}

impl ProcessingConfig {
    /// Sets the executable.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the per-stage timeout, if enabled.
    #[must_use]
    pub fn process_timeout(&self) -> Option<Duration> {
        (self.process_timeout_ms > 0).then(|| Duration::from_millis(self.process_timeout_ms))
    }

    /// Returns the poll interval as a Duration.
    #[must_use]
    pub fn status_check_interval(&self) -> Duration {
        Duration::from_millis(self.status_check_interval_ms)
    }
}

/// Script locations, relative to the application root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Geocoding script.
    #[serde(default = "default_geocode_script")]
    pub geocode: PathBuf,
    /// Travel-time script.
    #[serde(default = "default_route_times_script")]
    pub route_times: PathBuf,
    /// Time-scenario script.
    #[serde(default = "default_scenarios_script")]
    pub scenarios: PathBuf,
}

fn default_geocode_script() -> PathBuf {
    PathBuf::from("PythonScripts/geocode.py")
}

fn default_route_times_script() -> PathBuf {
    PathBuf::from("PythonScripts/route_times.py")
}

fn default_scenarios_script() -> PathBuf {
    PathBuf::from("PythonScripts/czasy_przejazdu_perturb.py")
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            geocode: default_geocode_script(),
            route_times: default_route_times_script(),
            scenarios: default_scenarios_script(),
        }
    }
}

impl ScriptConfig {
    /// Returns the script for a stage.
    #[must_use]
    pub fn for_stage(&self, stage: StageId) -> &Path {
        match stage {
            StageId::Geocode => &self.geocode,
            StageId::RouteTimes => &self.route_times,
            StageId::Scenarios => &self.scenarios,
        }
    }

    /// Overrides the script for a stage.
    #[must_use]
    pub fn with_script(mut self, stage: StageId, script: impl Into<PathBuf>) -> Self {
        let script = script.into();
        match stage {
            StageId::Geocode => self.geocode = script,
            StageId::RouteTimes => self.route_times = script,
            StageId::Scenarios => self.scenarios = script,
        }
        self
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

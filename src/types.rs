use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::ScanError;

/// Which engine subcommand a scan runs under.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Web,
    Api,
}

impl ScanMode {
    /// Subcommand passed to the engine image.
    pub fn engine_subcommand(self) -> &'static str {
        match self {
            ScanMode::Web => "web",
            ScanMode::Api => "api",
        }
    }

    /// Tag the ingestion backend uses to tell web and api results apart.
    pub fn result_type(self) -> &'static str {
        match self {
            ScanMode::Web => "DAST",
            ScanMode::Api => "DASAPI",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.engine_subcommand())
    }
}

pub const DEFAULT_ENGINE: &str = "docker";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;

/// Everything one scan invocation needs from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub mode: ScanMode,
    pub input_file: PathBuf,
    pub openapi_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub engine: String,
    pub timeout_secs: u64,
    pub update_interval_secs: u64,
}

impl ScanRequest {
    pub fn new(mode: ScanMode, input_file: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            input_file: input_file.into(),
            openapi_file: None,
            output_dir: PathBuf::from("."),
            engine: DEFAULT_ENGINE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }

    pub fn with_openapi(mut self, path: impl Into<PathBuf>) -> Self {
        self.openapi_file = Some(path.into());
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Check the shape of the request before anything touches the filesystem.
    ///
    /// Readability of the input files is checked later, while staging.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.input_file.as_os_str().is_empty() {
            return Err(ScanError::Validation(
                "--file is required for dast-realtime command".into(),
            ));
        }
        if self.engine.trim().is_empty() {
            return Err(ScanError::Validation("--engine must not be empty".into()));
        }
        match (self.mode, self.openapi_file.as_deref()) {
            (ScanMode::Api, None) => Err(ScanError::Validation(
                "--openapi is required for an api scan".into(),
            )),
            (ScanMode::Api, Some(spec)) if spec.as_os_str().is_empty() => Err(
                ScanError::Validation("--openapi is required for an api scan".into()),
            ),
            (ScanMode::Api, Some(spec)) => {
                if spec.file_name() == self.input_file.file_name() {
                    return Err(ScanError::Validation(format!(
                        "input file and open API file share the name {:?}",
                        spec.file_name().unwrap_or_default()
                    )));
                }
                Ok(())
            }
            (ScanMode::Web, Some(_)) => Err(ScanError::Validation(
                "--openapi is only accepted for an api scan".into(),
            )),
            (ScanMode::Web, None) => Ok(()),
        }
    }
}

/// Per-severity counts as returned by the ingestion backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskCount {
    pub high_count: u32,
    pub medium_count: u32,
    pub low_count: u32,
    pub info_count: u32,
}

/// Severity counts plus their total; printed as the final JSON line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskSummary {
    pub severity_counter: RiskCount,
    #[serde(rename = "total")]
    pub total_count: u64,
}

impl From<RiskCount> for RiskSummary {
    fn from(counts: RiskCount) -> Self {
        let total_count = [
            counts.high_count,
            counts.medium_count,
            counts.low_count,
            counts.info_count,
        ]
        .iter()
        .map(|&c| u64::from(c))
        .sum();
        Self {
            severity_counter: counts,
            total_count,
        }
    }
}

/// Structured error body the backend sends with 400 and 500 responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

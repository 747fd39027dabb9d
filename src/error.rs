use std::path::PathBuf;

use thiserror::Error;

pub const INVALID_ENGINE_HINT: &str = "Please verify if engine is installed and running";

/// Every way a single scan invocation can fail.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing or inconsistent user input.
    #[error("invalid scan request: {0}")]
    Validation(String),

    /// Workspace creation or local file I/O failed.
    #[error("{context}")]
    Environment {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The container runtime binary could not be found on `PATH`.
    #[error("container engine '{engine}' not found in $PATH. {hint}")]
    EngineUnavailable { engine: String, hint: &'static str },

    /// The engine ran but exited abnormally.
    #[error("Check container engine state. Failed: {0}")]
    ContainerExecution(String),

    /// The engine exited cleanly but left no report behind.
    #[error("scan report not found at {path}")]
    ResultUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send results")]
    Submission(#[from] SubmissionError),

    /// The backend answered with a status outside the documented set.
    #[error("Failed to send results: response status code {status}")]
    Protocol { status: u16 },
}

impl ScanError {
    pub(crate) fn environment(context: impl Into<String>, source: std::io::Error) -> Self {
        ScanError::Environment {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("CODE: {code}, {message}")]
    Api { code: i64, message: String },

    #[error("failed to parse response body")]
    Decode(#[source] reqwest::Error),

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

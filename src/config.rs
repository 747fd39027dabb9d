use std::time::Duration;

use clap::Args;

/// Where and how scan results are submitted.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SubmissionConfig {
    /// Base URI of the results ingestion API.
    #[arg(long = "base-uri", env = "DAST_BASE_URI", default_value = "http://127.0.0.1:80")]
    pub base_uri: String,

    /// Path of the results endpoint, relative to the base URI.
    #[arg(long = "results-path", env = "DAST_RESULTS_PATH", default_value = "api/dast/results")]
    pub results_path: String,

    /// Client-side timeout for the submission request, in seconds.
    #[arg(long = "client-timeout", env = "DAST_CLIENT_TIMEOUT", default_value_t = 100)]
    pub client_timeout_secs: u64,

    /// Bearer token sent with the submission, if the backend requires one.
    #[arg(long = "api-token", env = "DAST_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

impl SubmissionConfig {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            results_path: "api/dast/results".into(),
            client_timeout_secs: 100,
            api_token: None,
        }
    }

    pub fn results_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_uri.trim_end_matches('/'),
            self.results_path.trim_start_matches('/')
        )
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

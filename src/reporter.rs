use std::fs;
use std::io::{self, Write};
use std::path::Path;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::SubmissionConfig;
use crate::error::{ScanError, SubmissionError};
use crate::types::{ApiError, RiskCount, RiskSummary, ScanMode};
use crate::workspace::{Workspace, LOG_ARTIFACT, PERSISTED_LOG_NAME, REPORT_ARTIFACT};

pub const RUNTIME_TAG: &str = "ast-cli";

/// Engine artifacts read back from the workspace after a clean exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub report: Vec<u8>,
    pub log: Option<Vec<u8>>,
}

impl ScanReport {
    /// Read the report (required) and the engine log (optional).
    pub fn collect(workspace: &Workspace) -> Result<Self, ScanError> {
        let report_path = workspace.artifact(REPORT_ARTIFACT);
        let report = fs::read(&report_path).map_err(|source| ScanError::ResultUnavailable {
            path: report_path,
            source,
        })?;
        let log = match fs::read(workspace.artifact(LOG_ARTIFACT)) {
            Ok(log) => Some(log),
            Err(e) => {
                debug!(error = %e, "Failed to get ZAP logs");
                None
            }
        };
        Ok(Self { report, log })
    }

    /// Copy the artifacts into `output_dir`, replacing earlier copies.
    ///
    /// `zap.log` is always rewritten, empty when the engine left no log.
    pub fn persist(&self, output_dir: &Path) -> Result<(), ScanError> {
        fs::create_dir_all(output_dir).map_err(|e| {
            ScanError::environment(
                format!("failed to create output directory {}", output_dir.display()),
                e,
            )
        })?;
        write_artifact(&output_dir.join(REPORT_ARTIFACT), &self.report)?;
        // An empty log replaces any copy left behind by an earlier scan.
        write_artifact(
            &output_dir.join(PERSISTED_LOG_NAME),
            self.log.as_deref().unwrap_or_default(),
        )
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), ScanError> {
    fs::write(path, bytes)
        .map_err(|e| ScanError::environment(format!("failed to write {}", path.display()), e))
}

/// Gzip `bytes` at the default compression level.
pub fn compress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Payload posted to the results ingestion endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResultEnvelope {
    pub tenant_id: String,
    pub scan_id: String,
    pub runtime: String,
    pub result_type: String,
    #[serde(with = "base64_bytes")]
    pub results: Vec<u8>,
    pub completed: bool,
}

impl ResultEnvelope {
    /// Wrap already-compressed report bytes with fresh identifiers.
    pub fn new(mode: ScanMode, results: Vec<u8>) -> Self {
        Self {
            // The backend takes the tenant from the auth token; this id only fills the field.
            tenant_id: Uuid::new_v4().to_string(),
            scan_id: Uuid::new_v4().to_string(),
            runtime: RUNTIME_TAG.to_string(),
            result_type: mode.result_type().to_string(),
            results,
            completed: true,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Sends a result envelope to the ingestion backend.
#[async_trait]
pub trait ResultsSubmitter: Send + Sync {
    async fn send_results(&self, envelope: &ResultEnvelope) -> Result<RiskCount, ScanError>;
}

#[derive(Debug, Clone)]
pub struct HttpResultsClient {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
}

impl HttpResultsClient {
    pub fn new(config: &SubmissionConfig) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(config.client_timeout())
            .build()
            .map_err(SubmissionError::Client)?;
        Ok(Self {
            client,
            url: config.results_url(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl ResultsSubmitter for HttpResultsClient {
    async fn send_results(&self, envelope: &ResultEnvelope) -> Result<RiskCount, ScanError> {
        let mut request = self.client.post(&self.url).json(envelope);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        debug!(url = %self.url, scan_id = %envelope.scan_id, "submitting scan results");

        let response = request
            .send()
            .await
            .map_err(|source| SubmissionError::Transport {
                url: self.url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(response
                .json::<RiskCount>()
                .await
                .map_err(SubmissionError::Decode)?),
            StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR => {
                let api = response
                    .json::<ApiError>()
                    .await
                    .map_err(SubmissionError::Decode)?;
                Err(SubmissionError::Api {
                    code: api.code,
                    message: api.message,
                }
                .into())
            }
            other => Err(ScanError::Protocol {
                status: other.as_u16(),
            }),
        }
    }
}

/// Collect, persist, compress and submit the workspace's results.
pub async fn report_results(
    workspace: &Workspace,
    mode: ScanMode,
    output_dir: &Path,
    submitter: &dyn ResultsSubmitter,
) -> Result<RiskSummary, ScanError> {
    let report = ScanReport::collect(workspace)?;
    report.persist(output_dir)?;

    let compressed = compress(&report.report)
        .map_err(|e| ScanError::environment("failed to compress scan report", e))?;
    let envelope = ResultEnvelope::new(mode, compressed);

    let counts = submitter.send_results(&envelope).await?;
    Ok(RiskSummary::from(counts))
}

#![allow(dead_code)]

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tokio::sync::Notify;

use dast_realtime::reporter::{ResultEnvelope, ResultsSubmitter};
use dast_realtime::runtime::ContainerRuntime;
use dast_realtime::types::RiskCount;
use dast_realtime::workspace::{LOG_ARTIFACT, REPORT_ARTIFACT};
use dast_realtime::ScanError;

pub const RESULTS_PATH: &str = "/api/dast/results";

#[derive(Clone)]
struct Backend {
    status: StatusCode,
    body: String,
    received: Arc<Mutex<Vec<ResultEnvelope>>>,
}

/// Stub ingestion API answering every submission with `status` and `body`.
pub struct StubBackend {
    pub base_uri: String,
    pub received: Arc<Mutex<Vec<ResultEnvelope>>>,
}

impl StubBackend {
    pub async fn start(status: StatusCode, body: impl Into<String>) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = Backend {
            status,
            body: body.into(),
            received: Arc::clone(&received),
        };
        let app = Router::new()
            .route(RESULTS_PATH, post(receive))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_uri: format!("http://{addr}"),
            received,
        }
    }

    pub fn received(&self) -> Vec<ResultEnvelope> {
        self.received.lock().unwrap().clone()
    }
}

async fn receive(
    State(backend): State<Backend>,
    Json(envelope): Json<ResultEnvelope>,
) -> impl IntoResponse {
    backend.received.lock().unwrap().push(envelope);
    (
        backend.status,
        [("content-type", "application/json")],
        backend.body,
    )
}

/// What the fake engine does when asked to run a scan container.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write a report (and optionally a log) and exit 0.
    Report {
        report: &'static str,
        log: Option<&'static str>,
    },
    /// Exit 0 without producing a report.
    NoReport,
    /// Write an optional partial log and exit 1.
    Fail { log: Option<&'static str> },
    /// Behave as if the engine binary is not installed.
    Missing,
}

#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// In-memory stand-in for docker.
pub struct FakeEngine {
    behavior: Behavior,
    gate: Option<Arc<Gate>>,
    runs: Mutex<Vec<Vec<String>>>,
    workspaces: Mutex<Vec<PathBuf>>,
    running: Mutex<Vec<String>>,
    killed: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            gate: None,
            runs: Mutex::new(Vec::new()),
            workspaces: Mutex::new(Vec::new()),
            running: Mutex::new(Vec::new()),
            killed: Mutex::new(Vec::new()),
        }
    }

    /// Hold every run open until `gate.release` is notified.
    pub fn gated(behavior: Behavior, gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(behavior)
        }
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.workspaces.lock().unwrap().clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.killed.lock().unwrap().clone()
    }
}

pub fn flag_value(args: &[String], flag: &str) -> String {
    let idx = args.iter().position(|a| a == flag).unwrap();
    args[idx + 1].clone()
}

#[async_trait]
impl ContainerRuntime for FakeEngine {
    fn binary(&self) -> &str {
        "fake-docker"
    }

    async fn run(&self, args: &[String], _verbose: bool) -> io::Result<ExitStatus> {
        self.runs.lock().unwrap().push(args.to_vec());

        let volume = flag_value(args, "-v");
        let host = PathBuf::from(volume.strip_suffix(":/path").unwrap());
        self.workspaces.lock().unwrap().push(host.clone());

        if let Behavior::Missing = self.behavior {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No such file or directory (os error 2)",
            ));
        }

        let name = flag_value(args, "--name");
        self.running.lock().unwrap().push(name.clone());
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.running.lock().unwrap().retain(|n| n != &name);

        match &self.behavior {
            Behavior::Report { report, log } => {
                std::fs::write(host.join(REPORT_ARTIFACT), report)?;
                if let Some(log) = log {
                    std::fs::write(host.join(LOG_ARTIFACT), log)?;
                }
                Ok(ExitStatus::from_raw(0))
            }
            Behavior::NoReport => Ok(ExitStatus::from_raw(0)),
            Behavior::Fail { log } => {
                if let Some(log) = log {
                    std::fs::write(host.join(LOG_ARTIFACT), log)?;
                }
                Ok(ExitStatus::from_raw(1 << 8))
            }
            Behavior::Missing => unreachable!(),
        }
    }

    async fn list_running(&self) -> anyhow::Result<String> {
        Ok(self.running.lock().unwrap().join("\n"))
    }

    async fn kill(&self, name: &str) -> anyhow::Result<String> {
        self.killed.lock().unwrap().push(name.to_string());
        Ok(name.to_string())
    }
}

/// Submitter that answers with fixed counts and records how often it was used.
#[derive(Default)]
pub struct CountingSubmitter {
    pub counts: RiskCount,
    pub calls: Mutex<Vec<ResultEnvelope>>,
}

impl CountingSubmitter {
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ResultsSubmitter for CountingSubmitter {
    async fn send_results(&self, envelope: &ResultEnvelope) -> Result<RiskCount, ScanError> {
        self.calls.lock().unwrap().push(envelope.clone());
        Ok(self.counts)
    }
}

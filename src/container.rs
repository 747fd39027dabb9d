use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ScanError, INVALID_ENGINE_HINT};
use crate::runtime::ContainerRuntime;
use crate::types::{ScanMode, ScanRequest};
use crate::workspace::{Workspace, CONTAINER_MOUNT_PATH, LOG_ARTIFACT, PERSISTED_LOG_NAME};

pub const CONTAINER_NAME_PREFIX: &str = "cli-dast-realtime-";
pub const ENGINE_IMAGE: &str = "dast:cli";
const JVM_PROPERTIES: &str = "-Xmx512m";
const ENGINE_LOG_LEVEL: &str = "debug";

/// Unique name of one scan container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn generate() -> Self {
        Self(format!("{CONTAINER_NAME_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name of the scan container currently running, if any.
///
/// One handle is given to the scan pipeline, which registers the name for the
/// lifetime of the container; clones are given to the reaper, which only reads.
#[derive(Debug, Clone, Default)]
pub struct ActiveContainer {
    slot: Arc<RwLock<Option<ContainerName>>>,
}

impl ActiveContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `name` until the returned guard is dropped.
    pub fn register(&self, name: ContainerName) -> ActiveContainerGuard {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(name.clone());
        ActiveContainerGuard {
            slot: Arc::clone(&self.slot),
            name,
        }
    }

    pub fn current(&self) -> Option<ContainerName> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Clears the [`ActiveContainer`] slot on drop.
#[derive(Debug)]
pub struct ActiveContainerGuard {
    slot: Arc<RwLock<Option<ContainerName>>>,
    name: ContainerName,
}

impl ActiveContainerGuard {
    pub fn name(&self) -> &ContainerName {
        &self.name
    }
}

impl Drop for ActiveContainerGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref() == Some(&self.name) {
            *slot = None;
        }
    }
}

/// A fully resolved `run` command for the engine image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    pub image: String,
    pub volume: String,
    pub name: ContainerName,
    pub mode: ScanMode,
    pub openapi_path: Option<String>,
    pub input_path: String,
    pub timeout_secs: u64,
    pub update_interval_secs: u64,
}

impl ContainerInvocation {
    pub fn new(
        request: &ScanRequest,
        workspace: &Workspace,
        name: ContainerName,
    ) -> Result<Self, ScanError> {
        let openapi_path = match request.mode {
            ScanMode::Web => None,
            ScanMode::Api => Some(workspace.container_openapi_path().ok_or_else(|| {
                ScanError::Validation("--openapi is required for an api scan".into())
            })?),
        };
        Ok(Self {
            image: ENGINE_IMAGE.to_string(),
            volume: workspace.volume_mapping(),
            name,
            mode: request.mode,
            openapi_path,
            input_path: workspace.container_input_path(),
            timeout_secs: request.timeout_secs,
            update_interval_secs: request.update_interval_secs,
        })
    }

    /// Engine arguments in the order the image expects them.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "-v".into(),
            self.volume.clone(),
            "--name".into(),
            self.name.to_string(),
            self.image.clone(),
            self.mode.engine_subcommand().into(),
        ];
        if let (ScanMode::Api, Some(spec)) = (self.mode, self.openapi_path.as_ref()) {
            args.push("--openapi".into());
            args.push(spec.clone());
        }
        args.extend([
            "--path".into(),
            self.input_path.clone(),
            "--output".into(),
            CONTAINER_MOUNT_PATH.into(),
            "--timeout".into(),
            self.timeout_secs.to_string(),
            "--update-interval".into(),
            self.update_interval_secs.to_string(),
            "--jvm-properties".into(),
            JVM_PROPERTIES.into(),
            "--log-level".into(),
            ENGINE_LOG_LEVEL.into(),
        ]);
        args
    }
}

/// Run the engine container to completion and classify how it ended.
///
/// On an abnormal exit the partial engine log is copied to `output_dir`
/// before the error is returned.
pub async fn run_container(
    runtime: &dyn ContainerRuntime,
    invocation: &ContainerInvocation,
    workspace: &Workspace,
    output_dir: &Path,
    verbose: bool,
) -> Result<(), ScanError> {
    debug!(container = %invocation.name, engine = runtime.binary(), "Starting dast container");
    debug!("The report format and output path cannot be overridden.");

    let failure = match runtime.run(&invocation.args(), verbose).await {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => format!("engine exited with {status}"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(error = %e, "container engine binary not found");
            return Err(ScanError::EngineUnavailable {
                engine: runtime.binary().to_string(),
                hint: INVALID_ENGINE_HINT,
            });
        }
        Err(e) => e.to_string(),
    };

    warn!(container = %invocation.name, %failure, "scan container failed");
    salvage_log(workspace, output_dir);
    Err(ScanError::ContainerExecution(failure))
}

/// Copy the engine log to `output_dir`, writing an empty one when the engine
/// left none so a log from an earlier scan is not mistaken for this one.
fn salvage_log(workspace: &Workspace, output_dir: &Path) {
    let logs = fs::read(workspace.artifact(LOG_ARTIFACT)).unwrap_or_else(|e| {
        debug!(error = %e, "No zap logs available");
        Vec::new()
    });
    let target = output_dir.join(PERSISTED_LOG_NAME);
    if let Err(e) = fs::create_dir_all(output_dir).and_then(|_| fs::write(&target, logs)) {
        debug!(path = %target.display(), error = %e, "Failed to write zap logs");
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::ScanError;
use crate::types::ScanRequest;

/// Mount point of the workspace inside the engine container.
pub const CONTAINER_MOUNT_PATH: &str = "/path";

const TEMP_DIR_PREFIX: &str = "dast";

/// JSON report the engine writes into the workspace.
pub const REPORT_ARTIFACT: &str = "ZAP-Report.json";
/// Plain-text engine log inside the workspace.
pub const LOG_ARTIFACT: &str = "zap";
/// Name the engine log is persisted under in the output directory.
pub const PERSISTED_LOG_NAME: &str = "zap.log";

/// Ephemeral staging directory owned by one scan invocation.
///
/// The directory is removed when the value is dropped, so every exit path of
/// the owning invocation releases it.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    input_name: String,
    openapi_name: Option<String>,
}

impl Workspace {
    /// Create a fresh directory and copy the request's input files into it.
    pub fn stage(request: &ScanRequest) -> Result<Self, ScanError> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(|e| ScanError::environment("Error creating temporary directory", e))?;
        debug!(workspace = %dir.path().display(), "created scan workspace");

        let input_name = stage_file(dir.path(), &request.input_file, "--file")?;
        let openapi_name = match request.openapi_file.as_deref() {
            Some(spec) => Some(stage_file(dir.path(), spec, "--openapi")?),
            None => None,
        };

        Ok(Self {
            dir,
            input_name,
            openapi_name,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `host-dir:/path` descriptor handed to the container runtime's `-v` flag.
    pub fn volume_mapping(&self) -> String {
        format!("{}:{}", self.dir.path().display(), CONTAINER_MOUNT_PATH)
    }

    /// Location of the staged input file as seen from inside the container.
    pub fn container_input_path(&self) -> String {
        format!("{CONTAINER_MOUNT_PATH}/{}", self.input_name)
    }

    pub fn container_openapi_path(&self) -> Option<String> {
        self.openapi_name
            .as_ref()
            .map(|name| format!("{CONTAINER_MOUNT_PATH}/{name}"))
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now, logging rather than failing if removal fails.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        debug!(workspace = %path.display(), "Removing folder in temp");
        if let Err(e) = self.dir.close() {
            debug!(workspace = %path.display(), error = %e, "failed to remove workspace");
        }
    }
}

/// Copy `source` into `dir`; `flag` names the option it came from.
fn stage_file(dir: &Path, source: &Path, flag: &str) -> Result<String, ScanError> {
    if source.as_os_str().is_empty() {
        return Err(ScanError::Validation(format!(
            "{flag} is required for dast-realtime command"
        )));
    }
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ScanError::Validation(format!("{} does not name a file", source.display()))
        })?
        .to_string();

    let contents = fs::read(source).map_err(|e| {
        ScanError::environment(format!("Error reading file {}", source.display()), e)
    })?;
    fs::write(dir.join(&name), contents).map_err(|e| {
        ScanError::environment(
            format!("Error writing {name} to temporary directory"),
            e,
        )
    })?;
    Ok(name)
}

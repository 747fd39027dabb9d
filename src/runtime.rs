//! The narrow seam between this crate and the container engine CLI.

use std::io;
use std::process::{ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Operations the scan runner and the reaper need from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Name of the engine binary, used in error messages.
    fn binary(&self) -> &str;

    /// Run the engine with `args` until it exits.
    ///
    /// Engine output is inherited when `verbose` is set and discarded otherwise.
    async fn run(&self, args: &[String], verbose: bool) -> io::Result<ExitStatus>;

    /// Raw output of the engine's running-container listing.
    async fn list_running(&self) -> Result<String>;

    /// Force-kill the container called `name`, returning the engine's output.
    async fn kill(&self, name: &str) -> Result<String>;
}

/// A [`ContainerRuntime`] that shells out to `docker`, `podman` or any
/// CLI-compatible engine found on `PATH`.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn combined_output(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run {} {}", self.binary, args.join(" ")))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            bail!(
                "{} {} exited with {}: {}",
                self.binary,
                args.join(" "),
                output.status,
                text.trim()
            );
        }
        Ok(text)
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: &[String], verbose: bool) -> io::Result<ExitStatus> {
        let (stdout, stderr) = if verbose {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
    }

    async fn list_running(&self) -> Result<String> {
        self.combined_output(&["ps"]).await
    }

    async fn kill(&self, name: &str) -> Result<String> {
        self.combined_output(&["kill", name]).await
    }
}

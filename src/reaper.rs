//! Kills the active scan container when the process is asked to terminate.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::container::{ActiveContainer, ContainerName};
use crate::runtime::ContainerRuntime;

pub const EXIT_NOTHING_TO_KILL: i32 = 0;
pub const EXIT_CONTAINER_KILLED: i32 = 143;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperState {
    Waiting,
    HandlingTermination,
}

/// What the reaper did once termination was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaperOutcome {
    NothingToKill,
    Killed(ContainerName),
    ListingFailed,
    KillFailed(ContainerName),
}

impl ReaperOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ReaperOutcome::NothingToKill => EXIT_NOTHING_TO_KILL,
            ReaperOutcome::Killed(_) => EXIT_CONTAINER_KILLED,
            ReaperOutcome::ListingFailed | ReaperOutcome::KillFailed(_) => EXIT_FAILURE,
        }
    }
}

pub struct Reaper {
    runtime: Arc<dyn ContainerRuntime>,
    active: ActiveContainer,
    state: ReaperState,
}

impl Reaper {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, active: ActiveContainer) -> Self {
        Self {
            runtime,
            active,
            state: ReaperState::Waiting,
        }
    }

    pub fn state(&self) -> ReaperState {
        self.state
    }

    /// Wait until `termination` fires, then reap.
    pub async fn wait(mut self, termination: CancellationToken) -> ReaperOutcome {
        termination.cancelled().await;
        self.handle_termination().await
    }

    /// Kill the registered scan container if the engine lists it as running.
    pub async fn handle_termination(&mut self) -> ReaperOutcome {
        self.state = ReaperState::HandlingTermination;

        let Some(name) = self.active.current() else {
            debug!("termination requested with no scan container registered");
            return ReaperOutcome::NothingToKill;
        };

        let listing = match self.runtime.list_running().await {
            Ok(out) => out,
            Err(e) => {
                error!(error = %format!("{e:#}"), "failed to list running containers");
                return ReaperOutcome::ListingFailed;
            }
        };
        debug!(output = %listing, "running containers");

        if !lists_container(&listing, &name) {
            return ReaperOutcome::NothingToKill;
        }

        match self.runtime.kill(name.as_str()).await {
            Ok(out) => {
                debug!(output = %out.trim(), container = %name, "kill output");
                ReaperOutcome::Killed(name)
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), container = %name, "failed to kill scan container");
                ReaperOutcome::KillFailed(name)
            }
        }
    }

    /// Start the reaper for the rest of the process lifetime.
    ///
    /// Must be called from within a Tokio runtime. The process exits with the
    /// outcome's exit code once a termination signal has been handled.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let termination = CancellationToken::new();
        listen_for_termination(termination.clone())?;
        Ok(tokio::spawn(async move {
            let outcome = self.wait(termination).await;
            info!(?outcome, "terminating after signal");
            std::process::exit(outcome.exit_code());
        }))
    }
}

/// `true` when `name` appears as a whole word in the engine's listing.
fn lists_container(listing: &str, name: &ContainerName) -> bool {
    listing.split_whitespace().any(|word| word == name.as_str())
}

#[cfg(unix)]
fn listen_for_termination(token: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => debug!("received SIGTERM"),
            _ = tokio::signal::ctrl_c() => debug!("received Ctrl-C"),
        }
        token.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn listen_for_termination(token: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    Ok(())
}

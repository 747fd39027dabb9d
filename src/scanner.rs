use std::sync::Arc;

use tracing::{debug, info};

use crate::container::{run_container, ActiveContainer, ContainerInvocation, ContainerName};
use crate::error::ScanError;
use crate::reporter::{report_results, ResultsSubmitter};
use crate::runtime::ContainerRuntime;
use crate::types::{RiskSummary, ScanRequest};
use crate::workspace::Workspace;

/// Runs one scan end to end: stage, run the engine container, report.
///
/// The workspace is removed before [`Scanner::run`] returns, whatever the
/// outcome. The scan container's name is published on the shared
/// [`ActiveContainer`] for exactly as long as the container may be running.
pub struct Scanner {
    runtime: Arc<dyn ContainerRuntime>,
    submitter: Arc<dyn ResultsSubmitter>,
    active: ActiveContainer,
    verbose: bool,
}

impl Scanner {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        submitter: Arc<dyn ResultsSubmitter>,
        active: ActiveContainer,
    ) -> Self {
        Self {
            runtime,
            submitter,
            active,
            verbose: false,
        }
    }

    /// Inherit the engine's stdout/stderr instead of discarding them.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn run(&self, request: &ScanRequest) -> Result<RiskSummary, ScanError> {
        request.validate()?;
        let workspace = Workspace::stage(request)?;
        let result = self.run_in(&workspace, request).await;
        workspace.close();
        result
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        request: &ScanRequest,
    ) -> Result<RiskSummary, ScanError> {
        let name = ContainerName::generate();
        let invocation = ContainerInvocation::new(request, workspace, name.clone())?;
        info!(mode = %request.mode, container = %name, "running dast scan");

        {
            let _registered = self.active.register(name);
            run_container(
                self.runtime.as_ref(),
                &invocation,
                workspace,
                &request.output_dir,
                self.verbose,
            )
            .await?;
        }
        debug!("scan container exited cleanly, collecting results");

        report_results(
            workspace,
            request.mode,
            &request.output_dir,
            self.submitter.as_ref(),
        )
        .await
    }
}

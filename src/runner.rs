//! Plan runner for pipeline jobs.
//!
//! This module drives one job from the raw event to the terminal status
//! report: parse parameters, fetch and extract the source bundle, resolve
//! credentials, locate the workspace, plan, package and upload the result
//! bundle, and report exactly once.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::artifact::{
    ArchiveExtractor, ArtifactStore, ArtifactStoreConnector, PlanOutcome, ResultPackager,
};
use crate::config::{InvocationParameters, Metadata, RunnerConfig};
use crate::credentials::{
    load_secret_variables, AccountCredentialResolver, CredentialResolver, CredentialSet,
    IdentityService, PipelineCredentialResolver, SecretSource,
};
use crate::error::{ArtifactError, PlanError, Result};
use crate::pipeline::{submit, ArtifactRef, JobReporter, PipelineJob, Verdict};
use crate::planner::{PlanExecutor, ToolRunner};
use crate::workspace::WorkspaceLocator;

/// Prefix of the per-job extraction directory.
const WORK_DIR_PREFIX: &str = "terraform-plan-";

/// Phases of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Decoding the invocation parameters.
    ParsingParameters,
    /// Downloading the source bundle.
    FetchingArtifact,
    /// Unpacking the source bundle and reading its metadata.
    Extracting,
    /// Resolving plan credentials and secret variables.
    ResolvingCredentials,
    /// Finding the environment directory.
    LocatingWorkspace,
    /// Running the planning tool.
    Planning,
    /// Building the result bundle.
    Packaging,
    /// Uploading the result bundle.
    Uploading,
    /// Reporting the terminal status.
    Reporting,
    /// The job finished and was reported as succeeded.
    Done,
    /// The job failed.
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ParsingParameters => "parsing-parameters",
            Self::FetchingArtifact => "fetching-artifact",
            Self::Extracting => "extracting",
            Self::ResolvingCredentials => "resolving-credentials",
            Self::LocatingWorkspace => "locating-workspace",
            Self::Planning => "planning",
            Self::Packaging => "packaging",
            Self::Uploading => "uploading",
            Self::Reporting => "reporting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Job identifier.
    pub job_id: String,
    /// Verdict sent to the orchestrator.
    pub verdict: Verdict,
    /// Terminal phase: `Done` or `Failed`.
    pub phase: RunPhase,
    /// Phase where the first failure happened.
    pub failed_at: Option<RunPhase>,
    /// Whether a result bundle was uploaded.
    pub bundle_uploaded: bool,
    /// Error from the status report call, if it failed.
    pub report_error: Option<String>,
}

impl RunReport {
    /// Returns true if the job succeeded and was reported.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.verdict.is_success() && self.report_error.is_none()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.verdict {
            Verdict::Success => write!(f, "Job {} succeeded", self.job_id)?,
            Verdict::Failure(message) => write!(f, "Job {} failed: {message}", self.job_id)?,
        }
        if let Some(phase) = self.failed_at {
            write!(f, " (at {phase})")?;
        }
        if let Some(e) = &self.report_error {
            write!(f, "; status report failed: {e}")?;
        }
        Ok(())
    }
}

/// Phase bookkeeping for a run in progress.
#[derive(Debug)]
struct Progress {
    phase: RunPhase,
    failed_at: Option<RunPhase>,
    bundle_uploaded: bool,
}

impl Progress {
    const fn new() -> Self {
        Self {
            phase: RunPhase::ParsingParameters,
            failed_at: None,
            bundle_uploaded: false,
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("Phase: {} -> {phase}", self.phase);
        self.phase = phase;
    }

    fn fail(&mut self) {
        if self.failed_at.is_none() {
            self.failed_at = Some(self.phase);
        }
    }
}

/// Everything the planning stage needs, produced by the earlier phases.
struct Prepared {
    params: InvocationParameters,
    output: ArtifactRef,
    store: Box<dyn ArtifactStore>,
    metadata: Metadata,
    workspace: PathBuf,
    env_vars: BTreeMap<String, String>,
    /// Owns the extraction directory until the run ends.
    _work_dir: TempDir,
}

/// Runs pipeline jobs.
pub struct PlanRunner<'a> {
    /// Process-wide configuration.
    config: &'a RunnerConfig,
    /// Artifact store factory.
    connector: &'a dyn ArtifactStoreConnector,
    /// Identity collaborator for cross-account plans.
    identity: &'a dyn IdentityService,
    /// Secret variable source.
    secrets: &'a dyn SecretSource,
    /// Job status reporter.
    reporter: &'a dyn JobReporter,
    /// Planning tool runner.
    tools: &'a dyn ToolRunner,
    /// Archive extractor.
    extractor: ArchiveExtractor,
    /// Result bundle packager.
    packager: ResultPackager,
    /// Workspace locator.
    locator: WorkspaceLocator,
}

impl<'a> PlanRunner<'a> {
    /// Creates a new plan runner.
    #[must_use]
    pub const fn new(
        config: &'a RunnerConfig,
        connector: &'a dyn ArtifactStoreConnector,
        identity: &'a dyn IdentityService,
        secrets: &'a dyn SecretSource,
        reporter: &'a dyn JobReporter,
        tools: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            config,
            connector,
            identity,
            secrets,
            reporter,
            tools,
            extractor: ArchiveExtractor::new(),
            packager: ResultPackager::new(),
            locator: WorkspaceLocator::new(),
        }
    }

    /// Runs one job to completion and reports its status.
    ///
    /// Never fails: every error ends up in the reported verdict, and a
    /// failing report call is recorded in the returned [`RunReport`].
    pub async fn run(&self, job: &PipelineJob) -> RunReport {
        info!("Processing job {}", job.id);
        let mut progress = Progress::new();

        let verdict = self.execute(job, &mut progress).await;

        progress.enter(RunPhase::Reporting);
        let report_error = match submit(self.reporter, &job.id, &verdict).await {
            Ok(()) => None,
            Err(e) => {
                error!("Failed to report job {} status: {e}", job.id);
                progress.fail();
                Some(e.to_string())
            }
        };

        let phase = if verdict.is_success() && report_error.is_none() {
            RunPhase::Done
        } else {
            RunPhase::Failed
        };
        progress.enter(phase);

        RunReport {
            job_id: job.id.clone(),
            verdict,
            phase,
            failed_at: progress.failed_at,
            bundle_uploaded: progress.bundle_uploaded,
            report_error,
        }
    }

    /// Runs every phase up to reporting and returns the verdict.
    async fn execute(&self, job: &PipelineJob, progress: &mut Progress) -> Verdict {
        let prepared = match self.prepare(job, progress).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Job {} failed during {}: {e}", job.id, progress.phase);
                progress.fail();
                return Verdict::Failure(e.to_string());
            }
        };

        progress.enter(RunPhase::Planning);
        let executor = PlanExecutor::new(self.tools, self.config);
        let planned = executor
            .run(&prepared.workspace, &prepared.params.env, &prepared.env_vars)
            .await;

        match planned {
            Ok(plan_text) => {
                info!("Plan completed for {}", prepared.params.env);
                let outcome =
                    PlanOutcome::succeeded(&prepared.params, &prepared.metadata, plan_text);
                match self.deliver(&prepared, &outcome, progress).await {
                    Ok(()) => Verdict::Success,
                    Err(e) => {
                        error!("Failed to upload results: {e}");
                        progress.fail();
                        Verdict::Failure(format!("Failed to upload results: {e}"))
                    }
                }
            }
            Err(plan_error) => {
                error!("Plan failed: {plan_error}");
                progress.fail();
                self.deliver_failure(&prepared, plan_error, progress).await
            }
        }
    }

    /// Uploads a failure bundle for a plan error and builds the verdict.
    async fn deliver_failure(
        &self,
        prepared: &Prepared,
        plan_error: PlanError,
        progress: &mut Progress,
    ) -> Verdict {
        let outcome = PlanOutcome::failed(
            &prepared.params,
            &prepared.metadata,
            plan_error.to_string(),
            plan_error.captured_output(),
        );

        match self.deliver(prepared, &outcome, progress).await {
            Ok(()) => Verdict::Failure(format!("Terraform plan failed: {plan_error}")),
            Err(upload_error) => {
                error!("Failed to upload failure results: {upload_error}");
                Verdict::Failure(format!(
                    "Plan failed and could not upload results: {upload_error}; plan error: {plan_error}"
                ))
            }
        }
    }

    /// Parses parameters, fetches and extracts the bundle, resolves
    /// credentials and locates the workspace.
    async fn prepare(&self, job: &PipelineJob, progress: &mut Progress) -> Result<Prepared> {
        progress.enter(RunPhase::ParsingParameters);
        let params =
            InvocationParameters::from_configuration(&job.data.action_configuration.configuration)?;
        let input = job.data.input_ref()?.clone();
        let output = job.data.output_ref()?.clone();
        info!(
            "Environment: {}, account: {}",
            params.env,
            params.account_id.as_deref().unwrap_or("(current)")
        );

        progress.enter(RunPhase::FetchingArtifact);
        let store_credentials = match &job.data.artifact_credentials {
            Some(supplied) => PipelineCredentialResolver::new(supplied.clone()).resolve().await?,
            None => CredentialSet::Ambient,
        };
        let store = self.connector.connect(&store_credentials);
        debug!(
            "Using {} artifact store with {} credentials",
            store.backend_type(),
            store_credentials.kind()
        );
        let archive = store.fetch(&input).await?;

        progress.enter(RunPhase::Extracting);
        let work_dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir()
            .map_err(|source| ArtifactError::WorkDir { source })?;
        let summary = self.extractor.extract(&archive, work_dir.path())?;
        debug!(
            "Extracted {} files and {} directories",
            summary.files, summary.directories
        );
        let metadata = Metadata::load(work_dir.path(), params.metadata_path())?;

        progress.enter(RunPhase::ResolvingCredentials);
        let env_vars = self.plan_environment(&params).await?;

        progress.enter(RunPhase::LocatingWorkspace);
        let workspace = self.locator.locate(work_dir.path(), &params.env)?;
        info!("Using workspace {}", workspace.display());

        Ok(Prepared {
            params,
            output,
            store,
            metadata,
            workspace,
            env_vars,
            _work_dir: work_dir,
        })
    }

    /// Builds the extra environment for the planning tool.
    async fn plan_environment(
        &self,
        params: &InvocationParameters,
    ) -> Result<BTreeMap<String, String>> {
        let credentials = match &params.account_id {
            Some(account) => {
                AccountCredentialResolver::new(
                    self.identity,
                    account.clone(),
                    self.config.cross_account_role.clone(),
                )
                .resolve()
                .await?
            }
            None => {
                debug!("No account_id supplied; planning with ambient credentials");
                CredentialSet::Ambient
            }
        };

        let mut env_vars =
            load_secret_variables(self.secrets, self.config.parameter_prefix.as_deref()).await?;
        env_vars.extend(credentials.env_vars());
        debug!(
            "Plan environment: {} variables, {} credentials",
            env_vars.len(),
            credentials.kind()
        );
        Ok(env_vars)
    }

    /// Packages and uploads `outcome`.
    async fn deliver(
        &self,
        prepared: &Prepared,
        outcome: &PlanOutcome,
        progress: &mut Progress,
    ) -> Result<()> {
        progress.enter(RunPhase::Packaging);
        let bundle = self.packager.package(outcome)?;

        progress.enter(RunPhase::Uploading);
        prepared.store.put(&prepared.output, bundle).await?;
        progress.bundle_uploaded = true;
        info!("Uploaded results to {}", prepared.output);
        Ok(())
    }
}

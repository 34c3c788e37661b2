//! tf-plan-runner CLI entrypoint.
//!
//! This is the main entrypoint for the tf-plan-runner command-line tool.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tf_plan_runner::artifact::S3Connector;
use tf_plan_runner::cli::{Cli, Commands};
use tf_plan_runner::config::RunnerConfig;
use tf_plan_runner::credentials::{ParameterStoreSecrets, StsIdentityService};
use tf_plan_runner::error::Result;
use tf_plan_runner::pipeline::{CodePipelineReporter, PipelineEvent};
use tf_plan_runner::planner::ProcessRunner;
use tf_plan_runner::runner::PlanRunner;
use tf_plan_runner::workspace::{candidate_dirs, WorkspaceLocator};

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.json_logs);
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run { event, tool_path } => cmd_run(&event, tool_path).await,
        Commands::Locate { root, env } => cmd_locate(&root, &env),
    }
}

/// Runs one pipeline job and reports its status.
async fn cmd_run(event_source: &str, tool_path: Option<PathBuf>) -> Result<ExitCode> {
    let mut config = RunnerConfig::from_env();
    if let Some(path) = tool_path {
        config = config.with_tool_path(path);
    }
    debug!("Runner configuration: {config:?}");

    let raw = read_event(event_source)?;
    let event = PipelineEvent::from_json(&raw)?;

    let sdk_config = aws_config::load_from_env().await;
    let connector = S3Connector::new(sdk_config.clone());
    let identity = StsIdentityService::from_conf(&sdk_config);
    let secrets = ParameterStoreSecrets::from_conf(&sdk_config);
    let reporter =
        CodePipelineReporter::from_conf(&sdk_config).with_execution_id(config.execution_id.clone());
    let tools = ProcessRunner::new();

    let runner = PlanRunner::new(&config, &connector, &identity, &secrets, &reporter, &tools);
    let report = runner.run(&event.job).await;

    if report.is_success() {
        info!("{report}");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{report}");
        Ok(ExitCode::FAILURE)
    }
}

/// Prints the workspace directory chosen for an environment.
fn cmd_locate(root: &Path, env: &str) -> Result<ExitCode> {
    let candidates = candidate_dirs(root, env);
    debug!("Candidates: {candidates:?}");

    let workspace = WorkspaceLocator::new().locate(root, env)?;
    println!("{}", workspace.display());
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Reads the job event from a file, or from stdin for `-`.
fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        Ok(raw)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

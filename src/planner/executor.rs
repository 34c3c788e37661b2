//! Plan executor for the planning tool.
//!
//! Runs `init`, `plan` and `show` in sequence inside the workspace. `init`
//! and `plan` failures are fatal and carry the captured console output;
//! a failing `show` only costs the rendering and falls back to the raw
//! plan output.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{AccountDirectory, RunnerConfig};
use crate::error::{PlanError, PlanStage};

use super::process::{CommandOutput, ToolRunner};

/// Name of the saved plan file inside the workspace.
pub const PLAN_FILE: &str = "tfplan";

/// Returns the `-var=` flags forwarding account ids to `plan`.
///
/// `dev` and `prod` get the tools account; `tools` gets the dev and prod
/// accounts. Unset accounts are skipped.
#[must_use]
pub fn account_variables(environment: &str, accounts: &AccountDirectory) -> Vec<String> {
    let forwarded: Vec<(&str, Option<&String>)> = match environment {
        "dev" | "prod" => vec![("tools_account_id", accounts.tools.as_ref())],
        "tools" => vec![
            ("dev_account_id", accounts.dev.as_ref()),
            ("prod_account_id", accounts.prod.as_ref()),
        ],
        _ => vec![],
    };

    forwarded
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| format!("-var={name}={v}")))
        .collect()
}

/// Executor for the init, plan and show stages.
pub struct PlanExecutor<'a> {
    /// Subprocess runner.
    runner: &'a dyn ToolRunner,
    /// Process-wide configuration.
    config: &'a RunnerConfig,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(runner: &'a dyn ToolRunner, config: &'a RunnerConfig) -> Self {
        Self { runner, config }
    }

    /// Runs the plan for `environment` inside `workspace`.
    ///
    /// `env_vars` are added to the inherited process environment of every
    /// stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is missing, `init` or `plan` cannot be
    /// started, or either exits non-zero.
    pub async fn run(
        &self,
        workspace: &Path,
        environment: &str,
        env_vars: &BTreeMap<String, String>,
    ) -> Result<String, PlanError> {
        let tool = self.config.tool_name();
        let program = self.config.tool_path.as_path();

        if !self.runner.tool_exists(program) {
            return Err(PlanError::ToolNotFound {
                tool,
                path: program.to_path_buf(),
            });
        }

        info!("Running {tool} init in {}", workspace.display());
        let init = self
            .stage(PlanStage::Init, &init_args(), workspace, env_vars)
            .await?;
        if !init.success {
            return Err(PlanError::InitializationFailed {
                tool,
                output: init.output,
            });
        }
        debug!("{tool} init output:\n{}", init.output);

        let args = plan_args(environment, &self.config.accounts);
        info!("Running {tool} {}", args.join(" "));
        let plan = self.stage(PlanStage::Plan, &args, workspace, env_vars).await?;
        if !plan.success {
            return Err(PlanError::PlanComputationFailed {
                tool,
                output: plan.output,
            });
        }

        info!("Running {tool} show");
        match self.stage(PlanStage::Show, &show_args(), workspace, env_vars).await {
            Ok(show) if show.success => Ok(show.output),
            Ok(show) => {
                warn!(
                    "{tool} show exited with {:?}; using plan output instead",
                    show.exit_code
                );
                Ok(plan.output)
            }
            Err(e) => {
                warn!("{e}; using plan output instead");
                Ok(plan.output)
            }
        }
    }

    async fn stage(
        &self,
        stage: PlanStage,
        args: &[String],
        workspace: &Path,
        env_vars: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, PlanError> {
        self.runner
            .run(&self.config.tool_path, args, workspace, env_vars)
            .await
            .map_err(|e| PlanError::Spawn {
                tool: self.config.tool_name(),
                stage,
                message: e.to_string(),
            })
    }
}

fn init_args() -> Vec<String> {
    to_args(&["init", "-backend=false", "-no-color", "-input=false"])
}

fn plan_args(environment: &str, accounts: &AccountDirectory) -> Vec<String> {
    let out = format!("-out={PLAN_FILE}");
    let mut args = to_args(&["plan", out.as_str(), "-no-color", "-input=false"]);
    args.extend(account_variables(environment, accounts));
    args
}

fn show_args() -> Vec<String> {
    to_args(&["show", "-no-color", PLAN_FILE])
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Scripted tool runner: replays one response per invocation.
    pub(crate) struct ScriptedRunner {
        pub(crate) exists: bool,
        responses: Mutex<VecDeque<std::io::Result<CommandOutput>>>,
        pub(crate) calls: Mutex<Vec<(Vec<String>, PathBuf, BTreeMap<String, String>)>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(responses: Vec<std::io::Result<CommandOutput>>) -> Self {
            Self {
                exists: true,
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn missing_tool() -> Self {
            Self {
                exists: false,
                ..Self::new(vec![])
            }
        }

        pub(crate) fn subcommands(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(args, _, _)| args[0].clone())
                .collect()
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        fn tool_exists(&self, _program: &Path) -> bool {
            self.exists
        }

        async fn run(
            &self,
            _program: &Path,
            args: &[String],
            dir: &Path,
            env: &BTreeMap<String, String>,
        ) -> std::io::Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((args.to_vec(), dir.to_path_buf(), env.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::ok("")))
        }
    }

    fn config() -> RunnerConfig {
        RunnerConfig {
            accounts: AccountDirectory {
                tools: Some("999999999999".to_string()),
                dev: Some("111111111111".to_string()),
                prod: None,
            },
            ..RunnerConfig::default()
        }
    }

    #[test]
    fn test_account_variables() {
        let accounts = config().accounts;
        assert_eq!(
            account_variables("dev", &accounts),
            vec!["-var=tools_account_id=999999999999".to_string()]
        );
        assert_eq!(
            account_variables("tools", &accounts),
            vec!["-var=dev_account_id=111111111111".to_string()]
        );
        assert!(account_variables("staging", &accounts).is_empty());
    }

    #[tokio::test]
    async fn test_successful_run_returns_show_output() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::ok("Initialized")),
            Ok(CommandOutput::ok("Plan: 1 to add")),
            Ok(CommandOutput::ok("No changes.")),
        ]);
        let config = config();
        let env = BTreeMap::from([("TF_VAR_token".to_string(), "t".to_string())]);

        let text = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w/environments/dev"), "dev", &env)
            .await
            .unwrap();

        assert_eq!(text, "No changes.");
        assert_eq!(runner.subcommands(), vec!["init", "plan", "show"]);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].0, init_args());
        assert!(calls[1].0.contains(&"-var=tools_account_id=999999999999".to_string()));
        assert_eq!(calls[2].0, vec!["show", "-no-color", "tfplan"]);
        for (_, dir, vars) in calls.iter() {
            assert_eq!(dir, Path::new("/w/environments/dev"));
            assert_eq!(vars.get("TF_VAR_token").map(String::as_str), Some("t"));
        }
    }

    #[tokio::test]
    async fn test_init_failure_stops_before_plan() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::failed(1, "module not found"))]);
        let config = config();

        let err = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w"), "dev", &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PlanError::InitializationFailed { .. }));
        assert_eq!(err.captured_output(), "module not found");
        assert_eq!(runner.subcommands(), vec!["init"]);
    }

    #[tokio::test]
    async fn test_plan_failure_keeps_output() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::failed(1, "Error: Invalid reference")),
        ]);
        let config = config();

        let err = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w"), "dev", &BTreeMap::new())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(PlanStage::Plan));
        assert_eq!(err.to_string(), "tofu plan failed: Error: Invalid reference");
    }

    #[tokio::test]
    async fn test_show_failure_degrades_to_plan_output() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("Plan: 2 to add, 0 to change, 0 to destroy.")),
            Ok(CommandOutput::failed(1, "Error: Failed to read plan")),
        ]);
        let config = config();

        let text = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w"), "dev", &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(text, "Plan: 2 to add, 0 to change, 0 to destroy.");
    }

    #[tokio::test]
    async fn test_show_spawn_error_degrades_to_plan_output() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("plan text")),
            Err(std::io::Error::other("interrupted")),
        ]);
        let config = config();

        let text = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w"), "dev", &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(text, "plan text");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let runner = ScriptedRunner::missing_tool();
        let config = config();

        let err = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w"), "dev", &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PlanError::ToolNotFound { .. }));
        assert!(runner.subcommands().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_in_init() {
        let runner = ScriptedRunner::new(vec![Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        ))]);
        let config = config();

        let err = PlanExecutor::new(&runner, &config)
            .run(Path::new("/w"), "dev", &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlanError::Spawn {
                stage: PlanStage::Init,
                ..
            }
        ));
        assert_eq!(err.captured_output(), "");
    }
}

//! Process-wide runner configuration.
//!
//! Everything the runner reads from the process environment is collected
//! here once, at start-up, and handed to the runner by value. Nothing below
//! this module calls `std::env::var`.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the bundled OpenTofu binary.
pub const DEFAULT_TOOL_PATH: &str = "/var/task/tofu";

/// Environment variable overriding the tool path.
pub const TOOL_PATH_VAR: &str = "TOFU_PATH";

/// Environment variable naming the role assumed in other accounts.
pub const CROSS_ACCOUNT_ROLE_VAR: &str = "CROSS_ACCOUNT_ROLE_NAME";

/// Environment variable holding the secret parameter prefix.
pub const PARAMETER_PREFIX_VAR: &str = "PARAMETER_STORE_PREFIX";

/// Environment variables that may carry an execution id for reports.
const EXECUTION_ID_VARS: &[&str] = &["TF_PLAN_RUNNER_EXECUTION_ID", "AWS_LAMBDA_REQUEST_ID"];

/// Account identifiers forwarded to specific environments as plan variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDirectory {
    /// Tools (pipeline) account, from `TOOLS_ACCOUNT_ID`.
    pub tools: Option<String>,
    /// Development account, from `DEV_ACCOUNT_ID`.
    pub dev: Option<String>,
    /// Production account, from `PROD_ACCOUNT_ID`.
    pub prod: Option<String>,
}

/// Runner configuration resolved from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Path to the planning tool binary.
    pub tool_path: PathBuf,
    /// Role name assumed when the target account differs from the caller's.
    pub cross_account_role: Option<String>,
    /// Well-known account identifiers.
    pub accounts: AccountDirectory,
    /// Secret parameter path prefix; `None` disables secret loading.
    pub parameter_prefix: Option<String>,
    /// External execution id attached to job reports.
    pub execution_id: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from(DEFAULT_TOOL_PATH),
            cross_account_role: None,
            accounts: AccountDirectory::default(),
            parameter_prefix: None,
            execution_id: None,
        }
    }
}

impl RunnerConfig {
    /// Reads the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let parameter_prefix = get(PARAMETER_PREFIX_VAR).map(|p| {
            let trimmed = p.trim_end_matches('/');
            if trimmed.is_empty() {
                String::from("/")
            } else {
                trimmed.to_string()
            }
        });

        let config = Self {
            tool_path: get(TOOL_PATH_VAR)
                .map_or_else(|| PathBuf::from(DEFAULT_TOOL_PATH), PathBuf::from),
            cross_account_role: get(CROSS_ACCOUNT_ROLE_VAR),
            accounts: AccountDirectory {
                tools: get("TOOLS_ACCOUNT_ID"),
                dev: get("DEV_ACCOUNT_ID"),
                prod: get("PROD_ACCOUNT_ID"),
            },
            parameter_prefix,
            execution_id: EXECUTION_ID_VARS.iter().find_map(|name| get(name)),
        };

        debug!(
            "Runner config: tool={}, role={:?}, prefix={:?}",
            config.tool_path.display(),
            config.cross_account_role,
            config.parameter_prefix
        );
        config
    }

    /// Sets the tool path.
    #[must_use]
    pub fn with_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_path = path.into();
        self
    }

    /// Returns the display name of the tool (`tofu`, `terraform`, ...).
    #[must_use]
    pub fn tool_name(&self) -> String {
        tool_display_name(&self.tool_path)
    }
}

fn tool_display_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("tofu")
        .to_string()
}

//! Configuration module for the plan runner.
//!
//! This module handles everything the runner is told rather than discovers:
//! - Process-wide settings read once from the environment (`RunnerConfig`)
//! - Per-invocation parameters passed by the orchestrator
//! - Provenance metadata shipped inside the source bundle

mod metadata;
mod params;
mod runner_config;

pub use metadata::Metadata;
pub use params::{InvocationParameters, DEFAULT_METADATA_PATH, USER_PARAMETERS_KEY};
pub use runner_config::{
    AccountDirectory, RunnerConfig, CROSS_ACCOUNT_ROLE_VAR, DEFAULT_TOOL_PATH,
    PARAMETER_PREFIX_VAR, TOOL_PATH_VAR,
};

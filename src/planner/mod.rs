//! Planning tool execution.
//!
//! This module runs the init, plan and show stages of the planning tool
//! inside a located workspace and captures the console output.

mod executor;
mod process;

pub use executor::{account_variables, PlanExecutor, PLAN_FILE};
pub use process::{CommandOutput, ProcessRunner, ToolRunner};

#[cfg(test)]
pub(crate) use executor::tests::ScriptedRunner;

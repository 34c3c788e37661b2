//! CLI module for the plan runner.
//!
//! This module provides the command-line interface used by the execution
//! host and for local diagnostics.

mod commands;

pub use commands::{Cli, Commands};

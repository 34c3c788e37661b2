//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runs an infrastructure plan for a pipeline job.
#[derive(Parser, Debug)]
#[command(name = "tf-plan-runner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the plan for one pipeline job event.
    Run {
        /// Path to the job event JSON, or `-` for stdin.
        #[arg(short, long, default_value = "-")]
        event: String,

        /// Path to the planning tool binary.
        #[arg(long, env = "TOFU_PATH")]
        tool_path: Option<PathBuf>,
    },

    /// Show which workspace directory would be used for an environment.
    Locate {
        /// Root of an extracted source bundle.
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Environment name.
        #[arg(short, long)]
        env: String,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["tf-plan-runner", "run"]).unwrap();
        let Commands::Run { event, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(event, "-");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tf-plan-runner",
            "locate",
            "--env",
            "dev",
            "--root",
            "/tmp/bundle",
            "--verbose",
            "--json-logs",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(cli.json_logs);
        let Commands::Locate { root, env } = cli.command else {
            panic!("expected locate");
        };
        assert_eq!(root, PathBuf::from("/tmp/bundle"));
        assert_eq!(env, "dev");
    }

    #[test]
    fn test_locate_requires_env() {
        assert!(Cli::try_parse_from(["tf-plan-runner", "locate"]).is_err());
    }
}

//! Subprocess execution for the planning tool.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr.
    pub output: String,
}

impl CommandOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            output: output.into(),
        }
    }

    /// Creates a failed output with the given exit code.
    #[must_use]
    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            output: output.into(),
        }
    }
}

/// Runs tool commands.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Returns true if `program` can be started: an existing path, or a
    /// bare name found on `PATH`.
    fn tool_exists(&self, program: &Path) -> bool;

    /// Runs `program` with `args` in `dir`, inheriting the process
    /// environment plus `env`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started or its
    /// output could not be collected. A non-zero exit is not an error.
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> std::io::Result<CommandOutput>;
}

/// Runs commands as local child processes.
///
/// Stdout and stderr share one temporary file so the captured text keeps
/// the order in which the tool wrote it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    fn tool_exists(&self, program: &Path) -> bool {
        if program.components().count() > 1 {
            return program.exists();
        }
        which::which(program).is_ok()
    }

    async fn run(
        &self,
        program: &Path,
        args: &[String],
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> std::io::Result<CommandOutput> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let mut capture = tempfile::tempfile()?;
        let stdout = capture.try_clone()?;
        let stderr = capture.try_clone()?;

        let status = Command::new(program)
            .args(args)
            .current_dir(dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .await?;

        capture.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        capture.read_to_end(&mut raw)?;

        debug!("{} exited with {status}", program.display());
        Ok(CommandOutput {
            success: status.success(),
            exit_code: status.code(),
            output: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr_in_order() {
        let temp = TempDir::new().unwrap();
        let output = ProcessRunner::new()
            .run(
                Path::new("/bin/sh"),
                &sh("echo first; echo second >&2; echo third"),
                temp.path(),
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.output, "first\nsecond\nthird\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let output = ProcessRunner::new()
            .run(
                Path::new("/bin/sh"),
                &sh("echo boom >&2; exit 3"),
                temp.path(),
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.output, "boom\n");
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "here").unwrap();
        let env = BTreeMap::from([("TF_VAR_region".to_string(), "eu-west-1".to_string())]);

        let output = ProcessRunner::new()
            .run(
                Path::new("/bin/sh"),
                &sh("cat marker.txt; echo \" $TF_VAR_region\""),
                temp.path(),
                &env,
            )
            .await
            .unwrap();

        assert_eq!(output.output, "here eu-west-1\n");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let temp = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        let missing = temp.path().join("no-such-tool");

        assert!(!runner.tool_exists(&missing));
        assert!(runner.run(&missing, &[], temp.path(), &BTreeMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_bare_name_resolves_on_path() {
        let temp = TempDir::new().unwrap();
        let runner = ProcessRunner::new();

        assert!(runner.tool_exists(Path::new("sh")));
        assert!(!runner.tool_exists(Path::new("no-such-tool-on-path")));

        let output = runner
            .run(Path::new("sh"), &sh("echo ok"), temp.path(), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(output.output, "ok\n");
    }
}

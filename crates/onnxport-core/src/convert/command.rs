//! Subprocess execution seam.
//!
//! The converter child process runs behind [`CommandRunner`] so tests can
//! script exit codes and streams without spawning anything.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// A fully specified child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Complete child environment. Nothing from the parent is inherited.
    pub env: Vec<(String, String)>,
}

/// Captured result of a completed child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a child process to completion with captured output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .env_clear()
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let output = command.output().await?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell_spec(cwd: &std::path::Path, script: &str, env: Vec<(String, String)>) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: cwd.to_path_buf(),
            env,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_exit_code_and_stderr() {
        let temp = TempDir::new().unwrap();
        let spec = shell_spec(temp.path(), "echo oops >&2; exit 3", vec![]);

        let output = SystemCommandRunner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_passes_only_the_given_environment() {
        let temp = TempDir::new().unwrap();
        let spec = shell_spec(
            temp.path(),
            "printf '%s|%s' \"$CHILD_ONLY\" \"$HOME\"",
            vec![("CHILD_ONLY".to_string(), "visible".to_string())],
        );

        let output = SystemCommandRunner.run(&spec).await.unwrap();
        assert!(output.success());
        // HOME is inherited from the parent normally; env_clear drops it.
        assert_eq!(output.stdout, "visible|");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_missing_program_is_an_error() {
        let temp = TempDir::new().unwrap();
        let spec = CommandSpec {
            program: "onnxport-no-such-binary".to_string(),
            args: vec![],
            cwd: temp.path().to_path_buf(),
            env: vec![],
        };

        assert!(SystemCommandRunner.run(&spec).await.is_err());
    }
}

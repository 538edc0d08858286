//! Model conversion through the toolchain subprocess.
//!
//! A conversion either succeeds or fails; both cases come back as a
//! [`ConversionOutcome`] carrying the child's stderr as the diagnostic
//! log. Errors never cross this boundary.

pub mod command;

pub use command::{CommandRunner, CommandSpec, ProcessOutput, SystemCommandRunner};

use crate::config::Config;
use crate::pipeline::ConversionRequest;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Environment variable the converter reads its registry credential from.
const CHILD_TOKEN_VAR: &str = "HF_TOKEN";

/// Rejection message for elevated trust without an operator credential.
pub const TRUST_REQUIRES_TOKEN: &str =
    "Trust Remote Code requires your own HuggingFace token.";

/// Result of one conversion attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutcome {
    pub success: bool,
    /// Child stderr, or the reason the child never ran.
    pub log: String,
}

impl ConversionOutcome {
    fn failure(log: impl Into<String>) -> Self {
        ConversionOutcome {
            success: false,
            log: log.into(),
        }
    }
}

/// Where the toolchain writes a model's converted files.
///
/// Shared between the conversion and publish stages so the path convention
/// lives in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    dir: PathBuf,
}

impl OutputLocation {
    pub fn new(config: &Config, source_model_id: &str) -> Self {
        OutputLocation {
            dir: config.toolchain_dir.join("models").join(source_model_id),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

/// Drives the converter child process for one model.
pub struct ConversionRunner<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
}

impl<'a> ConversionRunner<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Convert one model. Never fails outward: every problem is folded
    /// into the returned outcome.
    pub async fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
        if request.trust_remote_code && !self.config.token_source.is_operator() {
            warn!(
                "Rejecting elevated-trust conversion of {} without an operator token",
                request.source_model_id
            );
            return ConversionOutcome::failure(TRUST_REQUIRES_TOKEN);
        }

        let spec = self.command_spec(request);
        info!("Converting {}", request.source_model_id);

        match self.runner.run(&spec).await {
            Ok(output) => {
                if output.success() {
                    info!("Conversion of {} succeeded", request.source_model_id);
                } else {
                    warn!(
                        "Conversion of {} exited with {:?}",
                        request.source_model_id, output.exit_code
                    );
                }
                ConversionOutcome {
                    success: output.success(),
                    log: output.stderr,
                }
            }
            Err(e) => {
                error!("Conversion process failed to run: {}", e);
                ConversionOutcome::failure(e.to_string())
            }
        }
    }

    /// Child invocation for a request. The environment is exactly the
    /// registry credential, nothing else.
    fn command_spec(&self, request: &ConversionRequest) -> CommandSpec {
        let mut args = vec![
            "-m".to_string(),
            "scripts.convert".to_string(),
            "--quantize".to_string(),
            "--model_id".to_string(),
            request.source_model_id.clone(),
        ];
        if request.trust_remote_code {
            args.push("--trust_remote_code".to_string());
        }

        CommandSpec {
            program: "python3".to_string(),
            args,
            cwd: self.config.toolchain_dir.clone(),
            env: vec![(
                CHILD_TOKEN_VAR.to_string(),
                self.config.registry_token.clone(),
            )],
        }
    }
}

/// Scripted [`CommandRunner`] for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::{OnnxportError, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued results in order and records every invocation.
    pub struct FakeRunner {
        outputs: Mutex<VecDeque<std::result::Result<ProcessOutput, String>>>,
        pub calls: Mutex<Vec<CommandSpec>>,
        materialize: Mutex<Option<PathBuf>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            FakeRunner {
                outputs: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                materialize: Mutex::new(None),
            }
        }

        /// Make each run create `dir` with one converted file in it, the
        /// way a real conversion populates the output location.
        pub fn materialize_output(&self, dir: &Path) {
            *self.materialize.lock().unwrap() = Some(dir.to_path_buf());
        }

        /// Queue a normal exit with the given code and stderr.
        pub fn push_exit(&self, exit_code: i32, stderr: &str) {
            self.outputs.lock().unwrap().push_back(Ok(ProcessOutput {
                exit_code: Some(exit_code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }));
        }

        /// Queue a spawn failure.
        pub fn push_spawn_error(&self, message: &str) {
            self.outputs
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            if let Some(dir) = self.materialize.lock().unwrap().clone() {
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("model.onnx"), b"weights").unwrap();
            }
            let next = self
                .outputs
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected command invocation");
            match next {
                Ok(output) => Ok(output),
                Err(message) => Err(OnnxportError::Io {
                    message,
                    path: None,
                    source: None,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeRunner;
    use super::*;

    fn operator_config() -> Config {
        Config::with_credentials(Some("hf_operator".into()), None, "alice".into()).unwrap()
    }

    fn system_config() -> Config {
        Config::with_credentials(None, Some("hf_system".into()), "alice".into()).unwrap()
    }

    fn request(model_id: &str, trust: bool) -> ConversionRequest {
        ConversionRequest {
            source_model_id: model_id.to_string(),
            trust_remote_code: trust,
            reuse_same_repository: false,
        }
    }

    #[tokio::test]
    async fn test_trust_without_operator_token_is_rejected_before_spawn() {
        let config = system_config();
        let runner = FakeRunner::new();
        let converter = ConversionRunner::new(&config, &runner);

        let outcome = converter.convert(&request("alice/foo", true)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.log, TRUST_REQUIRES_TOKEN);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_conversion_keeps_stderr_as_log() {
        let config = operator_config();
        let runner = FakeRunner::new();
        runner.push_exit(0, "Quantizing: 100%");
        let converter = ConversionRunner::new(&config, &runner);

        let outcome = converter.convert(&request("alice/foo", false)).await;
        assert!(outcome.success);
        assert_eq!(outcome.log, "Quantizing: 100%");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_failure_with_stderr() {
        let config = operator_config();
        let runner = FakeRunner::new();
        runner.push_exit(1, "OOM");
        let converter = ConversionRunner::new(&config, &runner);

        let outcome = converter.convert(&request("alice/foo", false)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.log, "OOM");
    }

    #[tokio::test]
    async fn test_spawn_error_becomes_failure_outcome() {
        let config = operator_config();
        let runner = FakeRunner::new();
        runner.push_spawn_error("No such file or directory");
        let converter = ConversionRunner::new(&config, &runner);

        let outcome = converter.convert(&request("alice/foo", false)).await;
        assert!(!outcome.success);
        assert!(outcome.log.contains("No such file or directory"));
    }

    #[tokio::test]
    async fn test_command_spec_shape() {
        let config = operator_config();
        let runner = FakeRunner::new();
        runner.push_exit(0, "");
        let converter = ConversionRunner::new(&config, &runner);

        converter
            .convert(&request("EleutherAI/pythia-14m", false))
            .await;

        let calls = runner.calls.lock().unwrap();
        let spec = &calls[0];
        assert_eq!(spec.program, "python3");
        assert_eq!(
            spec.args,
            vec![
                "-m",
                "scripts.convert",
                "--quantize",
                "--model_id",
                "EleutherAI/pythia-14m"
            ]
        );
        assert_eq!(spec.cwd, config.toolchain_dir);
        assert_eq!(
            spec.env,
            vec![("HF_TOKEN".to_string(), "hf_operator".to_string())]
        );
    }

    #[tokio::test]
    async fn test_trust_flag_appended_with_operator_token() {
        let config = operator_config();
        let runner = FakeRunner::new();
        runner.push_exit(0, "");
        let converter = ConversionRunner::new(&config, &runner);

        converter.convert(&request("alice/foo", true)).await;

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].args.last().unwrap(), "--trust_remote_code");
    }

    #[test]
    fn test_output_location_nests_under_models() {
        let config = operator_config();
        let location = OutputLocation::new(&config, "EleutherAI/pythia-14m");
        assert_eq!(
            location.path(),
            config
                .toolchain_dir
                .join("models")
                .join("EleutherAI/pythia-14m")
        );
    }
}

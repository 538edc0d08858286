//! Run configuration.
//!
//! A [`Config`] is built once at startup and passed by reference into every
//! pipeline component. Credential and username resolution happen here so the
//! rest of the crate never touches the process environment.

use crate::error::{OnnxportError, Result};
use crate::hub;
use std::path::PathBuf;

/// Converter toolchain release fetched when none is checked out locally.
pub const DEFAULT_TOOLCHAIN_VERSION: &str = "3.6.1";

/// Base URL of the model registry.
pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://huggingface.co";

/// Base URL for toolchain release archives (tag and branch refs live below it).
pub const DEFAULT_TOOLCHAIN_ARCHIVE_BASE: &str =
    "https://github.com/huggingface/transformers.js/archive/refs";

/// Local checkout directory for the converter toolchain.
pub const DEFAULT_TOOLCHAIN_DIR: &str = "./transformers.js";

/// Environment variable carrying the system (fallback) registry token.
const SYSTEM_TOKEN_ENV_VAR: &str = "HF_TOKEN";

/// Environment variable naming the publish namespace when no operator token
/// is supplied.
const AUTHOR_NAME_ENV_VAR: &str = "SPACE_AUTHOR_NAME";

/// Where the registry credential came from.
///
/// Elevated-trust conversion is only allowed with an operator-supplied
/// token, so components check this rather than re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Provided explicitly by the operator for this run.
    Operator,
    /// Taken from the `HF_TOKEN` environment variable.
    System,
}

impl TokenSource {
    pub fn is_operator(&self) -> bool {
        matches!(self, TokenSource::Operator)
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential used for all registry calls and the converter subprocess.
    pub registry_token: String,
    /// Namespace converted models are published under.
    pub registry_username: String,
    /// Origin of `registry_token`.
    pub token_source: TokenSource,
    /// Toolchain release to fetch when provisioning.
    pub toolchain_version: String,
    /// Registry base URL.
    pub registry_base_url: String,
    /// Base URL for toolchain release archives.
    pub toolchain_archive_base: String,
    /// Local toolchain checkout directory.
    pub toolchain_dir: PathBuf,
}

impl Config {
    /// Build a configuration from already-resolved credentials.
    ///
    /// The operator token wins over the system token. With neither present
    /// construction fails: the pipeline never runs credential-less.
    pub fn with_credentials(
        operator_token: Option<String>,
        system_token: Option<String>,
        registry_username: String,
    ) -> Result<Self> {
        let (registry_token, token_source) = match non_empty(operator_token) {
            Some(token) => (token, TokenSource::Operator),
            None => match non_empty(system_token) {
                Some(token) => (token, TokenSource::System),
                None => {
                    return Err(OnnxportError::Config {
                        message: "When the user token is not provided, the system token must be set."
                            .to_string(),
                    })
                }
            },
        };

        if registry_username.trim().is_empty() {
            return Err(OnnxportError::Config {
                message: "Registry username must not be empty.".to_string(),
            });
        }

        Ok(Config {
            registry_token,
            registry_username,
            token_source,
            toolchain_version: DEFAULT_TOOLCHAIN_VERSION.to_string(),
            registry_base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            toolchain_archive_base: DEFAULT_TOOLCHAIN_ARCHIVE_BASE.to_string(),
            toolchain_dir: PathBuf::from(DEFAULT_TOOLCHAIN_DIR),
        })
    }

    /// Resolve a configuration from the environment and the registry.
    ///
    /// The username comes from `whoami` when the operator supplied a token.
    /// Otherwise the `SPACE_AUTHOR_NAME` variable is used, falling back to
    /// `whoami` with the system token.
    pub async fn resolve(operator_token: Option<String>) -> Result<Self> {
        let operator_token = non_empty(operator_token);
        let system_token = non_empty(std::env::var(SYSTEM_TOKEN_ENV_VAR).ok());

        let registry_username = match &operator_token {
            Some(token) => {
                hub::whoami(DEFAULT_REGISTRY_BASE_URL, token)
                    .await?
                    .name
            }
            None => match non_empty(std::env::var(AUTHOR_NAME_ENV_VAR).ok()) {
                Some(name) => name,
                None => match &system_token {
                    Some(token) => {
                        hub::whoami(DEFAULT_REGISTRY_BASE_URL, token)
                            .await?
                            .name
                    }
                    None => String::new(),
                },
            },
        };

        Config::with_credentials(operator_token, system_token, registry_username)
    }
}

/// Trim a candidate value and drop it when blank.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

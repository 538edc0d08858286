//! Registry client for the model hub.
//!
//! Covers the four API operations the pipeline needs:
//! - `whoami` token validation and username lookup
//! - repository existence checks
//! - idempotent repository creation
//! - folder upload through the commit endpoint
//!
//! # Module Organization
//!
//! - [`types`] - API request/response structs
//! - [`upload`] - Commit payload assembly for folder uploads
//!
//! The [`Registry`] trait is the seam tests replace with scripted fakes.

mod types;
pub mod upload;

pub use types::WhoamiResponse;
use types::CreateRepoRequest;

use crate::config::Config;
use crate::error::{OnnxportError, Result};
use crate::naming;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "onnxport/0.1";
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Commit summary used for folder uploads.
const UPLOAD_COMMIT_SUMMARY: &str = "Upload converted model files";

/// Registry operations the pipeline depends on.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Whether a model repository exists.
    async fn repo_exists(&self, model_id: &str) -> Result<bool>;

    /// Create a public model repository. Succeeds when it already exists.
    async fn create_repo(&self, model_id: &str) -> Result<()>;

    /// Upload every file under `local_dir` to the repository root.
    async fn upload_folder(&self, local_dir: &Path, model_id: &str) -> Result<()>;
}

/// HTTP client for the registry API.
pub struct HubClient {
    /// Client for API requests (has total timeout)
    client: Client,
    /// Client for uploads (connect timeout only, commits can be large)
    upload_client: Client,
    base_url: String,
    username: String,
    token: String,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl HubClient {
    /// Create a client bound to the configured registry and credential.
    pub fn new(config: &Config) -> Result<Self> {
        let client = api_client()?;

        let upload_client = Client::builder()
            .connect_timeout(API_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OnnxportError::Network {
                message: format!("Failed to create upload HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            upload_client,
            base_url: config.registry_base_url.clone(),
            username: config.registry_username.clone(),
            token: config.registry_token.clone(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[async_trait]
impl Registry for HubClient {
    async fn repo_exists(&self, model_id: &str) -> Result<bool> {
        // model_id is "namespace/name"; its slash is a path separator and
        // must not be percent-encoded.
        let url = format!("{}/api/models/{}", self.base_url, model_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Ok(false),
            status => Err(OnnxportError::RegistryApi {
                message: format!("Existence check for {} returned {}", model_id, status),
                status_code: Some(status.as_u16()),
            }),
        }
    }

    async fn create_repo(&self, model_id: &str) -> Result<()> {
        let (namespace, name) =
            naming::split_model_id(model_id).ok_or_else(|| OnnxportError::InvalidModelId(
                model_id.to_string(),
            ))?;

        // The registry accepts the personal namespace here too, so the
        // destination namespace is always passed through as-is.
        let body = CreateRepoRequest {
            repo_type: "model",
            name,
            organization: Some(namespace),
            private: false,
        };

        let url = format!("{}/api/repos/create", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Created repository {}", model_id);
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!("Repository {} already exists", model_id);
                Ok(())
            }
            status => Err(OnnxportError::RegistryApi {
                message: format!("Creating {} returned {}", model_id, status),
                status_code: Some(status.as_u16()),
            }),
        }
    }

    async fn upload_folder(&self, local_dir: &Path, model_id: &str) -> Result<()> {
        let staged = upload::stage_folder(local_dir)?;
        info!(
            "Uploading {} files from {} to {}",
            staged.len(),
            local_dir.display(),
            model_id
        );

        let mut files = Vec::with_capacity(staged.len());
        for file in staged {
            let content = tokio::fs::read(&file.local_path)
                .await
                .map_err(|e| OnnxportError::io_with_path(e, &file.local_path))?;
            files.push((file.repo_path, content));
        }

        let payload = upload::build_commit_payload(UPLOAD_COMMIT_SUMMARY, &files);
        let url = format!("{}/api/models/{}/commit/main", self.base_url, model_id);

        let response = self
            .upload_client
            .post(&url)
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OnnxportError::RegistryApi {
                message: format!("Upload to {} returned {}", model_id, status),
                status_code: Some(status.as_u16()),
            });
        }

        info!("Upload to {} complete", model_id);
        Ok(())
    }
}

/// Validate a token and return the account it belongs to.
///
/// Standalone because it runs during configuration resolution, before a
/// [`HubClient`] can be constructed.
pub async fn whoami(base_url: &str, token: &str) -> Result<WhoamiResponse> {
    let client = api_client()?;
    let url = format!("{}/api/whoami-v2", base_url);

    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(OnnxportError::RegistryApi {
            message: format!("Token validation returned {}", status),
            status_code: Some(status.as_u16()),
        });
    }

    Ok(response.json::<WhoamiResponse>().await?)
}

fn api_client() -> Result<Client> {
    Client::builder()
        .timeout(API_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| OnnxportError::Network {
            message: format!("Failed to create HTTP client: {}", e),
            cause: None,
        })
}

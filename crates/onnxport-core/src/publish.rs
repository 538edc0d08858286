//! Publishing converted models back to the registry.
//!
//! The coordinator owns the tail of the pipeline: make sure the
//! destination repository exists, give the artifact a README when the
//! converter produced none, upload the folder, and always delete the
//! local output afterward.

use crate::config::Config;
use crate::convert::OutputLocation;
use crate::error::{OnnxportError, Result};
use crate::hub::Registry;
use crate::naming;
use tracing::{debug, info, warn};

/// Why a publish attempt did not complete. Carries the caught cause as a
/// plain message; nothing propagates past this type.
#[derive(Debug, Clone)]
pub struct PublishFailure {
    pub message: String,
}

impl std::fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Uploads conversion output to its destination repository.
pub struct PublishCoordinator<'a> {
    config: &'a Config,
    registry: &'a dyn Registry,
}

impl<'a> PublishCoordinator<'a> {
    pub fn new(config: &'a Config, registry: &'a dyn Registry) -> Self {
        Self { config, registry }
    }

    /// Publish the converted files for `source_model_id` to
    /// `destination_model_id`.
    ///
    /// The output directory is removed on every exit path, success or not.
    pub async fn publish(
        &self,
        source_model_id: &str,
        destination_model_id: &str,
        output: &OutputLocation,
    ) -> std::result::Result<(), PublishFailure> {
        let result = self
            .upload(source_model_id, destination_model_id, output)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(output.path()).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove conversion output {}: {}",
                    output.path().display(),
                    e
                );
            }
        }

        result.map_err(|e| PublishFailure {
            message: e.to_string(),
        })
    }

    async fn upload(
        &self,
        source_model_id: &str,
        destination_model_id: &str,
        output: &OutputLocation,
    ) -> Result<()> {
        self.registry.create_repo(destination_model_id).await?;
        self.ensure_readme(source_model_id, output).await?;
        self.registry
            .upload_folder(output.path(), destination_model_id)
            .await?;
        info!("Published {} to {}", source_model_id, destination_model_id);
        Ok(())
    }

    /// Write the standard README unless the converter already produced one.
    async fn ensure_readme(&self, source_model_id: &str, output: &OutputLocation) -> Result<()> {
        let readme_path = output.path().join("README.md");
        if readme_path.exists() {
            debug!("Keeping README produced by the converter");
            return Ok(());
        }

        let contents = render_readme(&self.config.registry_base_url, source_model_id);
        tokio::fs::write(&readme_path, contents)
            .await
            .map_err(|e| OnnxportError::io_with_path(e, &readme_path))?;
        Ok(())
    }
}

/// README for a converted model: frontmatter naming the base model, then a
/// short provenance section.
pub fn render_readme(registry_base_url: &str, source_model_id: &str) -> String {
    let name = naming::split_model_id(source_model_id)
        .map(|(_, name)| name)
        .unwrap_or(source_model_id);
    let source_url = naming::repo_url(registry_base_url, source_model_id);

    format!(
        "---\n\
         library_name: transformers.js\n\
         base_model:\n\
         - {source}\n\
         ---\n\
         \n\
         # {name} (ONNX)\n\
         \n\
         This is an ONNX version of [{source}]({url}). It was automatically converted and uploaded using [this space](https://huggingface.co/spaces/onnx-community/convert-to-onnx).\n",
        source = source_model_id,
        name = name,
        url = source_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::testing::{FakeRegistry, RegistryEvent};
    use tempfile::TempDir;

    /// Config whose toolchain dir lives inside `temp`, plus an output
    /// location populated with one converted file.
    fn setup(temp: &TempDir, source_model_id: &str) -> (Config, OutputLocation) {
        let mut config =
            Config::with_credentials(Some("hf_tok".into()), None, "alice".into()).unwrap();
        config.toolchain_dir = temp.path().join("transformers.js");

        let output = OutputLocation::new(&config, source_model_id);
        std::fs::create_dir_all(output.path()).unwrap();
        std::fs::write(output.path().join("model.onnx"), b"weights").unwrap();
        (config, output)
    }

    #[tokio::test]
    async fn test_publish_creates_repo_then_uploads() {
        let temp = TempDir::new().unwrap();
        let (config, output) = setup(&temp, "alice/foo");
        let registry = FakeRegistry::new();
        let coordinator = PublishCoordinator::new(&config, &registry);

        coordinator
            .publish("alice/foo", "alice/foo-ONNX", &output)
            .await
            .unwrap();

        let events = registry.events.lock().unwrap().clone();
        assert!(matches!(
            events[0],
            RegistryEvent::Created { ref model_id } if model_id == "alice/foo-ONNX"
        ));
        assert!(matches!(
            events[1],
            RegistryEvent::Uploaded { ref model_id, .. } if model_id == "alice/foo-ONNX"
        ));
    }

    #[tokio::test]
    async fn test_readme_written_when_missing() {
        let temp = TempDir::new().unwrap();
        let (config, output) = setup(&temp, "alice/foo");
        let registry = FakeRegistry::new();
        let coordinator = PublishCoordinator::new(&config, &registry);

        coordinator
            .publish("alice/foo", "alice/foo-ONNX", &output)
            .await
            .unwrap();

        let uploads = registry.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].1.contains(&"README.md".to_string()));
        assert!(uploads[0].1.contains(&"model.onnx".to_string()));
    }

    #[tokio::test]
    async fn test_existing_readme_is_preserved() {
        let temp = TempDir::new().unwrap();
        let (config, output) = setup(&temp, "alice/foo");
        std::fs::write(output.path().join("README.md"), b"converter wrote this").unwrap();

        let registry = FakeRegistry::new();
        let coordinator = PublishCoordinator::new(&config, &registry);

        // Snapshot before publish removes the folder.
        let before = std::fs::read_to_string(output.path().join("README.md")).unwrap();
        coordinator
            .publish("alice/foo", "alice/foo-ONNX", &output)
            .await
            .unwrap();
        assert_eq!(before, "converter wrote this");

        let uploads = registry.uploads();
        assert!(uploads[0].1.contains(&"README.md".to_string()));
    }

    #[tokio::test]
    async fn test_output_dir_removed_after_success() {
        let temp = TempDir::new().unwrap();
        let (config, output) = setup(&temp, "alice/foo");
        let registry = FakeRegistry::new();
        let coordinator = PublishCoordinator::new(&config, &registry);

        coordinator
            .publish("alice/foo", "alice/foo-ONNX", &output)
            .await
            .unwrap();
        assert!(!output.path().exists());
    }

    #[tokio::test]
    async fn test_output_dir_removed_after_failure() {
        let temp = TempDir::new().unwrap();
        let (config, output) = setup(&temp, "alice/foo");
        let registry = FakeRegistry::new();
        registry.fail_uploads_with("commit rejected");
        let coordinator = PublishCoordinator::new(&config, &registry);

        let err = coordinator
            .publish("alice/foo", "alice/foo-ONNX", &output)
            .await
            .unwrap_err();
        assert!(err.message.contains("commit rejected"));
        assert!(!output.path().exists());
    }

    #[tokio::test]
    async fn test_create_failure_skips_upload() {
        let temp = TempDir::new().unwrap();
        let (config, output) = setup(&temp, "alice/foo");
        let registry = FakeRegistry::new();
        registry.fail_creates_with("forbidden");
        let coordinator = PublishCoordinator::new(&config, &registry);

        let err = coordinator
            .publish("alice/foo", "alice/foo-ONNX", &output)
            .await
            .unwrap_err();
        assert!(err.message.contains("forbidden"));
        assert!(registry.uploads().is_empty());
        assert!(!output.path().exists());
    }

    #[test]
    fn test_readme_contents() {
        let readme = render_readme("https://huggingface.co", "EleutherAI/pythia-14m");
        assert_eq!(
            readme,
            "---\n\
             library_name: transformers.js\n\
             base_model:\n\
             - EleutherAI/pythia-14m\n\
             ---\n\
             \n\
             # pythia-14m (ONNX)\n\
             \n\
             This is an ONNX version of [EleutherAI/pythia-14m](https://huggingface.co/EleutherAI/pythia-14m). It was automatically converted and uploaded using [this space](https://huggingface.co/spaces/onnx-community/convert-to-onnx).\n"
        );
    }
}

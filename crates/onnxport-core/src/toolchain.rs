//! Converter toolchain provisioning.
//!
//! Fetches a release archive of the converter toolchain and unpacks it into
//! the configured checkout directory. An existing checkout is trusted as-is,
//! so repeated runs reuse it.

use crate::config::Config;
use crate::error::{OnnxportError, Result};
use futures::StreamExt;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for the ref-kind probe request.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for the archive download. No total timeout: release
/// archives can take a while on slow links.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How a release archive is addressed below the archive base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Tags,
    Heads,
}

impl RefKind {
    fn as_str(&self) -> &'static str {
        match self {
            RefKind::Tags => "tags",
            RefKind::Heads => "heads",
        }
    }
}

/// Ensures a local toolchain checkout exists.
pub struct ToolchainProvisioner<'a> {
    config: &'a Config,
}

impl<'a> ToolchainProvisioner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Ensure the toolchain checkout exists, fetching it when absent.
    ///
    /// Safe to call repeatedly: a present checkout short-circuits before
    /// any network traffic.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.config.toolchain_dir.exists() {
            debug!(
                "Toolchain already present at {}",
                self.config.toolchain_dir.display()
            );
            return Ok(());
        }

        info!(
            "Provisioning toolchain {} into {}",
            self.config.toolchain_version,
            self.config.toolchain_dir.display()
        );

        let ref_kind = self.resolve_ref_kind().await;
        let url = self.archive_url(ref_kind);

        // NamedTempFile deletes the archive on drop, including error paths.
        let mut archive = tempfile::NamedTempFile::new()?;
        self.download_archive(&url, &mut archive).await?;
        self.unpack_archive(archive.path())?;

        info!(
            "Toolchain ready at {}",
            self.config.toolchain_dir.display()
        );
        Ok(())
    }

    /// Archive URL for the configured version under the given ref kind.
    fn archive_url(&self, ref_kind: RefKind) -> String {
        format!(
            "{}/{}/{}.tar.gz",
            self.config.toolchain_archive_base,
            ref_kind.as_str(),
            self.config.toolchain_version
        )
    }

    /// Decide whether the version names a tag or a branch head.
    ///
    /// Probes the tag archive URL; anything other than a 200 means the
    /// version is treated as a branch. Probe failures fall back to heads
    /// and are never fatal.
    async fn resolve_ref_kind(&self) -> RefKind {
        let client = match reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .user_agent("onnxport/0.1")
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to check tags, defaulting to heads: {}", e);
                return RefKind::Heads;
            }
        };

        match client.head(self.archive_url(RefKind::Tags)).send().await {
            Ok(response) if response.status().is_success() => RefKind::Tags,
            Ok(_) => RefKind::Heads,
            Err(e) => {
                warn!("Failed to check tags, defaulting to heads: {}", e);
                RefKind::Heads
            }
        }
    }

    /// Stream the archive at `url` into `file`.
    async fn download_archive(&self, url: &str, file: &mut tempfile::NamedTempFile) -> Result<()> {
        info!("Downloading toolchain archive from {}", url);

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent("onnxport/0.1")
            .build()
            .map_err(|e| OnnxportError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: Some(e.to_string()),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            OnnxportError::provisioning(format!("Toolchain archive download failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(OnnxportError::provisioning(format!(
                "Toolchain archive download returned {}",
                response.status()
            )));
        }

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                OnnxportError::provisioning(format!("Error reading archive chunk: {}", e))
            })?;
            file.write_all(&chunk)
                .map_err(|e| OnnxportError::io_with_path(e, file.path()))?;
            downloaded += chunk.len() as u64;
        }

        debug!("Archive download complete: {} bytes", downloaded);
        Ok(())
    }

    /// Extract the archive and move its single top-level directory into
    /// the checkout location.
    fn unpack_archive(&self, archive_path: &Path) -> Result<()> {
        let parent = match self.config.toolchain_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| OnnxportError::io_with_path(e, &parent))?;

        // Scratch dir sits next to the final checkout so the rename below
        // stays on one filesystem. TempDir removes it on drop.
        let scratch = tempfile::Builder::new()
            .prefix("onnxport-toolchain-")
            .tempdir_in(&parent)?;

        let file = std::fs::File::open(archive_path)
            .map_err(|e| OnnxportError::io_with_path(e, archive_path))?;
        let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(scratch.path()).map_err(|e| {
            OnnxportError::provisioning(format!("Failed to extract toolchain archive: {}", e))
        })?;

        // Release archives wrap everything in one versioned directory.
        let entries: Vec<_> = std::fs::read_dir(scratch.path())
            .map_err(|e| OnnxportError::io_with_path(e, scratch.path()))?
            .filter_map(|e| e.ok())
            .collect();

        let source_dir = match entries.as_slice() {
            [only] if only.path().is_dir() => only.path(),
            _ => {
                return Err(OnnxportError::provisioning(
                    "Toolchain archive did not contain a single top-level directory".to_string(),
                ))
            }
        };

        std::fs::rename(&source_dir, &self.config.toolchain_dir)
            .map_err(|e| OnnxportError::io_with_path(e, &self.config.toolchain_dir))?;
        Ok(())
    }
}

//! Commit payload assembly for folder uploads.
//!
//! The registry's commit endpoint takes newline-delimited JSON: one header
//! line describing the commit, then one line per file with its content
//! inlined as base64. Assembly is pure so tests can inspect payloads
//! without a server.

use crate::error::{OnnxportError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file staged for upload: repository-relative path plus local location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub repo_path: String,
    pub local_path: PathBuf,
}

/// Walk a directory and stage every regular file under it.
///
/// Repository paths are relative to `root` and always use forward slashes.
/// Results are sorted so payloads are deterministic.
pub fn stage_folder(root: &Path) -> Result<Vec<StagedFile>> {
    let mut staged = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| OnnxportError::Io {
            message: format!("Failed to walk upload folder: {}", e),
            path: Some(root.to_path_buf()),
            source: e.into_io_error(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| OnnxportError::Io {
                message: format!("Upload path escaped its root: {}", e),
                path: Some(entry.path().to_path_buf()),
                source: None,
            })?;
        let repo_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        staged.push(StagedFile {
            repo_path,
            local_path: entry.path().to_path_buf(),
        });
    }

    staged.sort_by(|a, b| a.repo_path.cmp(&b.repo_path));
    Ok(staged)
}

/// Build the NDJSON commit body for a set of files.
///
/// `files` pairs each repository path with the file's raw bytes.
pub fn build_commit_payload(summary: &str, files: &[(String, Vec<u8>)]) -> String {
    let mut lines = Vec::with_capacity(files.len() + 1);

    lines.push(
        json!({
            "key": "header",
            "value": { "summary": summary, "description": "" }
        })
        .to_string(),
    );

    for (repo_path, content) in files {
        lines.push(
            json!({
                "key": "file",
                "value": {
                    "path": repo_path,
                    "content": BASE64.encode(content),
                    "encoding": "base64"
                }
            })
            .to_string(),
        );
    }

    lines.join("\n")
}

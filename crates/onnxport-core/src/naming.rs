//! Model id validation and destination naming.
//!
//! The destination a conversion publishes to is a pure function of the
//! source id, the publish namespace, and the operator's reuse choice. All
//! of that lives here so the rule is testable without any I/O.

use crate::error::{OnnxportError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Suffix appended to converted repositories published under a new name.
pub const CONVERTED_SUFFIX: &str = "-ONNX";

/// Shape of a well-formed `namespace/name` model id. Segments follow the
/// registry's rules: alphanumeric start, then word characters, dots or
/// hyphens.
static MODEL_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][\w.-]*/[A-Za-z0-9][\w.-]*$").unwrap());

/// Where a conversion will be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    /// Fully qualified destination id (`namespace/name`).
    pub destination_model_id: String,
    /// True when the destination is the source repository itself.
    pub same_repository: bool,
}

/// Validate a source model id, rejecting malformed input before any stage
/// runs.
pub fn validate_model_id(model_id: &str) -> Result<()> {
    if MODEL_ID_PATTERN.is_match(model_id) {
        Ok(())
    } else {
        Err(OnnxportError::InvalidModelId(model_id.to_string()))
    }
}

/// Split a model id into `(namespace, name)`.
///
/// Returns `None` when the id does not contain exactly one separator.
pub fn split_model_id(model_id: &str) -> Option<(&str, &str)> {
    let mut parts = model_id.splitn(2, '/');
    let namespace = parts.next()?;
    let name = parts.next()?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        None
    } else {
        Some((namespace, name))
    }
}

/// Derive the publish destination for a conversion.
///
/// The model keeps its name and moves under `registry_username`. A
/// `-ONNX` suffix is appended unless the operator owns the source
/// repository and chose to republish into it.
///
/// # Examples
///
/// ```
/// use onnxport_core::naming::derive_publish_target;
///
/// let target = derive_publish_target("alice/foo", "alice", true);
/// assert_eq!(target.destination_model_id, "alice/foo");
///
/// let target = derive_publish_target("bob/foo", "alice", true);
/// assert_eq!(target.destination_model_id, "alice/foo-ONNX");
/// ```
pub fn derive_publish_target(
    source_model_id: &str,
    registry_username: &str,
    reuse_same_repository: bool,
) -> PublishTarget {
    let (namespace, name) = match split_model_id(source_model_id) {
        Some(parts) => parts,
        None => ("", source_model_id),
    };

    let same_repository = reuse_same_repository && namespace == registry_username;
    let destination_model_id = if same_repository {
        format!("{}/{}", registry_username, name)
    } else {
        format!("{}/{}{}", registry_username, name, CONVERTED_SUFFIX)
    };

    PublishTarget {
        destination_model_id,
        same_repository,
    }
}

/// Browsable URL for a repository on the registry.
pub fn repo_url(registry_base_url: &str, model_id: &str) -> String {
    format!("{}/{}", registry_base_url.trim_end_matches('/'), model_id)
}

//! Error types for onnxport.
//!
//! Only failures that abort a run before or between stages live here.
//! Conversion and publish failures are ordinary outcome values carried by
//! [`crate::convert::ConversionOutcome`] and [`crate::publish::PublishFailure`]
//! so the pipeline can report them without unwinding.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the onnxport library.
#[derive(Debug, Error)]
pub enum OnnxportError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Registry API errors
    #[error("Registry API error: {message}")]
    RegistryApi {
        message: String,
        status_code: Option<u16>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Toolchain provisioning errors
    #[error("Toolchain provisioning failed: {message}")]
    Provisioning { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid model id: {0}")]
    InvalidModelId(String),
}

/// Result type alias for onnxport operations.
pub type Result<T> = std::result::Result<T, OnnxportError>;

// Conversion implementations for common error types

impl From<std::io::Error> for OnnxportError {
    fn from(err: std::io::Error) -> Self {
        OnnxportError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for OnnxportError {
    fn from(err: serde_json::Error) -> Self {
        OnnxportError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for OnnxportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OnnxportError::Timeout(std::time::Duration::from_secs(0))
        } else {
            OnnxportError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl OnnxportError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        OnnxportError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a provisioning error from any displayable cause.
    pub fn provisioning(message: impl Into<String>) -> Self {
        OnnxportError::Provisioning {
            message: message.into(),
        }
    }
}

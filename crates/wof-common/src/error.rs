//! Error types for Who's On First records

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for feature and vocabulary operations
pub type Result<T> = std::result::Result<T, WofError>;

/// Main error type for reading Who's On First data
#[derive(Error, Debug)]
pub enum WofError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feature is missing required property '{0}'")]
    MissingProperty(String),

    #[error("Feature property '{key}' is invalid: {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error("Unknown placetype: {0}")]
    UnknownPlacetype(String),
}

impl WofError {
    /// Create an I/O error carrying the offending path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid property error
    pub fn invalid_property(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

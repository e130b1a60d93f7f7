//! Error types for indexing
//!
//! Variants follow the life of a record: configuration and connectivity
//! problems stop a run before it starts, malformed input and store errors
//! abort a single record, and manifest errors abort a batch.

use std::path::{Path, PathBuf};
use thiserror::Error;
use wof_common::WofError;

/// Result type alias for indexing operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement execution or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The feature could not be parsed or lacks a required field
    #[error("Feature error: {0}")]
    Feature(#[from] WofError),

    #[error("Unsupported geometry mode '{0}'")]
    UnsupportedGeometryMode(String),

    #[error("No centroid available for {id}")]
    NoCentroid { id: i64 },

    #[error("No bounding box available for {id}")]
    MissingBbox { id: i64 },

    #[error("Feature {id} has no geometry")]
    MissingGeometry { id: i64 },

    #[error("Can't find wof:repo for {id}")]
    MissingRepo { id: i64 },

    #[error("Missing wof:repo for {id}")]
    EmptyRepo { id: i64 },

    #[error("Empty collection tag while indexing {id}")]
    EmptyCollection { id: i64 },

    #[error("Failed to encode {what} for {id}: {source}")]
    Encode {
        id: i64,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A file list or CSV manifest is structurally invalid
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("Traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A directory crawl stopped at the first record that failed
    #[error("Failed to index {path}, because {source}")]
    Crawl {
        path: PathBuf,
        #[source]
        source: Box<IndexError>,
    },

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0} is closed")]
    Closed(&'static str),
}

impl IndexError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an I/O error carrying the offending path
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the error only affects the record being indexed
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            IndexError::Database(_)
                | IndexError::Feature(_)
                | IndexError::UnsupportedGeometryMode(_)
                | IndexError::NoCentroid { .. }
                | IndexError::MissingBbox { .. }
                | IndexError::MissingGeometry { .. }
                | IndexError::MissingRepo { .. }
                | IndexError::EmptyRepo { .. }
                | IndexError::EmptyCollection { .. }
                | IndexError::Encode { .. }
                | IndexError::Io { .. }
        )
    }
}

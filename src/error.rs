use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the storage and data-source layers.
///
/// These never cross the manager's public API: every public operation catches
/// them, logs the root cause, and resolves to a `bool`/`Option` instead.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),

    #[error("database I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record for '{content_type}': {source}")]
    CorruptRecord {
        content_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("fetch failed for '{content_type}': {message}")]
    Fetch {
        content_type: String,
        message: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

//! Storage-specific error type wrapping IO and JSON errors.

use std::path::PathBuf;

use burrow_domain::error::BurrowError;

/// Errors originating from the JSON file store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the snapshot file failed.
    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the snapshot.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),
}

impl From<StorageError> for BurrowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

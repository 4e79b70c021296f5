//! Storage-specific error type for seed loading.

use flowhub_domain::error::FlowHubError;

/// Errors originating from the in-memory storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The seed file could not be read.
    #[error("unable to read seed file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The seed file is not a valid seed document.
    #[error("JSON deserialization error")]
    Json(#[from] serde_json::Error),
}

impl From<StorageError> for FlowHubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

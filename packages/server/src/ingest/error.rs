use common::storage::{HashError, StorageError};
use thiserror::Error;

use crate::records::RecordStoreError;

/// Caller-visible ingestion failures.
///
/// Digest conflicts are resolved inside the service and never appear here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No content, or content over the size limit.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The upload stream failed before reaching EOF.
    #[error("upload stream failed: {0}")]
    StreamRead(#[source] std::io::Error),
    /// Blob store, spool, or record store failure.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<HashError> for IngestError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::Read(e) => Self::StreamRead(e),
            HashError::Sink(e) => Self::StorageUnavailable(format!("spool write failed: {e}")),
            HashError::SizeLimitExceeded { limit, .. } => {
                Self::InvalidInput(format!("file exceeds maximum size of {limit} bytes"))
            }
        }
    }
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SizeLimitExceeded { limit, .. } => {
                Self::InvalidInput(format!("file exceeds maximum size of {limit} bytes"))
            }
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<RecordStoreError> for IngestError {
    fn from(err: RecordStoreError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

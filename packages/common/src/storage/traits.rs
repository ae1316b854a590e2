use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::locator::BlobLocator;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Blob persistence: store bytes, get a locator back.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store data from an async reader and return a fresh locator.
    ///
    /// Either the whole stream is persisted under the returned locator or
    /// nothing is visible at all.
    async fn put_stream(&self, reader: BoxReader) -> Result<BlobLocator, StorageError>;

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, locator: &BlobLocator) -> Result<BoxReader, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, locator: &BlobLocator) -> Result<bool, StorageError>;
}

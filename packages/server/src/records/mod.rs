//! Durable table of content records keyed by digest.
//!
//! The store is the single serialization point for ingestion: digest
//! uniqueness and counter increments are enforced here, by the backend,
//! rather than by a lookup-then-write sequence in application code.

mod filter;
mod sea;

use async_trait::async_trait;
use common::storage::{BlobLocator, ContentHash};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use filter::{Predicate, RecordFilter};
pub use sea::SeaOrmRecordStore;

/// A stored content record.
pub type ContentRecord = crate::entity::content_record::Model;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// Another caller created a record for this digest first.
    #[error("a record for digest {0} already exists")]
    DigestConflict(String),
    /// Size does not fit the signed 64-bit column.
    #[error("size {0} exceeds the storable range")]
    SizeOutOfRange(u64),
    #[error("record store unavailable: {0}")]
    Unavailable(#[from] DbErr),
}

/// Fields supplied by the ingester for a first-seen digest.
#[derive(Debug, Clone)]
pub struct NewContentRecord {
    pub digest: ContentHash,
    pub locator: BlobLocator,
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Aggregate figures over every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub records: i64,
    pub uploads: i64,
    pub bytes_stored: i64,
    pub bytes_saved: i64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn lookup(&self, digest: &ContentHash) -> Result<Option<ContentRecord>, RecordStoreError>;

    /// Insert a record with `upload_count = 1`.
    ///
    /// Fails with [`RecordStoreError::DigestConflict`] instead of overwriting
    /// when a record for the digest already exists.
    async fn create(&self, record: NewContentRecord) -> Result<ContentRecord, RecordStoreError>;

    /// Atomically add one to `upload_count` and return the updated record.
    ///
    /// Returns `None` if no record exists for the digest.
    async fn increment(
        &self,
        digest: &ContentHash,
    ) -> Result<Option<ContentRecord>, RecordStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ContentRecord>, RecordStoreError>;

    /// Records matching every predicate in `filter`, newest first.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<ContentRecord>, RecordStoreError>;

    async fn stats(&self) -> Result<StoreStats, RecordStoreError>;
}

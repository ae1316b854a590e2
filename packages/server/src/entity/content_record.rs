use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per distinct content digest.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_record")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// SHA-256 of the content, lowercase hex. Uniqueness is enforced by the
    /// database so concurrent first uploads cannot both insert.
    #[sea_orm(unique)]
    pub digest: String,

    /// Blob store locator for the persisted bytes.
    pub locator: String,

    /// Filename declared by the first uploader.
    pub original_filename: String,

    /// MIME type declared by the first uploader.
    pub content_type: String,

    /// Bytes actually hashed at first ingestion.
    pub size_bytes: i64,

    /// Number of uploads that resolved to this digest. Never below 1.
    pub upload_count: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Bytes not written to the blob store thanks to deduplication.
    pub fn bytes_saved(&self) -> i64 {
        (self.upload_count - 1).saturating_mul(self.size_bytes)
    }
}

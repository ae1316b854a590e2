use async_trait::async_trait;
use chrono::Utc;
use common::storage::ContentHash;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    ContentRecord, NewContentRecord, RecordFilter, RecordStore, RecordStoreError, StoreStats,
};
use crate::entity::content_record;

/// [`RecordStore`] backed by a SQL database through sea-orm.
///
/// Relies on the unique index over `content_record.digest` and on
/// `UPDATE ... RETURNING`, so PostgreSQL and SQLite are both supported.
#[derive(Clone)]
pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn lookup(&self, digest: &ContentHash) -> Result<Option<ContentRecord>, RecordStoreError> {
        Ok(content_record::Entity::find()
            .filter(content_record::Column::Digest.eq(digest.to_hex()))
            .one(&self.db)
            .await?)
    }

    #[instrument(skip(self, record), fields(digest = %record.digest.short()))]
    async fn create(&self, record: NewContentRecord) -> Result<ContentRecord, RecordStoreError> {
        let size_bytes = i64::try_from(record.size_bytes)
            .map_err(|_| RecordStoreError::SizeOutOfRange(record.size_bytes))?;
        let id = Uuid::now_v7();
        let digest = record.digest.to_hex();

        let model = content_record::ActiveModel {
            id: Set(id),
            digest: Set(digest.clone()),
            locator: Set(record.locator.to_string()),
            original_filename: Set(record.original_filename),
            content_type: Set(record.content_type),
            size_bytes: Set(size_bytes),
            upload_count: Set(1),
            created_at: Set(Utc::now()),
        };

        // DO NOTHING keeps the existing row intact; the caller learns about
        // the conflict from the zero row count.
        let inserted = match content_record::Entity::insert(model)
            .on_conflict(
                OnConflict::column(content_record::Column::Digest)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
        {
            Ok(rows) => rows,
            Err(DbErr::RecordNotInserted) => 0,
            Err(e) => return Err(e.into()),
        };

        if inserted == 0 {
            return Err(RecordStoreError::DigestConflict(digest));
        }

        content_record::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                RecordStoreError::Unavailable(DbErr::RecordNotFound(format!(
                    "content_record {id} missing after insert"
                )))
            })
    }

    #[instrument(skip(self), fields(digest = %digest.short()))]
    async fn increment(
        &self,
        digest: &ContentHash,
    ) -> Result<Option<ContentRecord>, RecordStoreError> {
        let updated = content_record::Entity::update_many()
            .col_expr(
                content_record::Column::UploadCount,
                Expr::col(content_record::Column::UploadCount).add(1),
            )
            .filter(content_record::Column::Digest.eq(digest.to_hex()))
            .exec_with_returning(&self.db)
            .await?;

        Ok(updated.into_iter().next())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ContentRecord>, RecordStoreError> {
        Ok(content_record::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<ContentRecord>, RecordStoreError> {
        Ok(content_record::Entity::find()
            .filter(filter.condition())
            .order_by_desc(content_record::Column::CreatedAt)
            .order_by_desc(content_record::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn stats(&self) -> Result<StoreStats, RecordStoreError> {
        // SUM over BIGINT is NUMERIC on PostgreSQL; cast back so both
        // backends decode into i64.
        let row: Option<(i64, i64, i64, i64)> = content_record::Entity::find()
            .select_only()
            .column_as(Expr::cust("COUNT(*)"), "records")
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(upload_count), 0) AS BIGINT)"),
                "uploads",
            )
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(size_bytes), 0) AS BIGINT)"),
                "bytes_stored",
            )
            .column_as(
                Expr::cust("CAST(COALESCE(SUM((upload_count - 1) * size_bytes), 0) AS BIGINT)"),
                "bytes_saved",
            )
            .into_tuple()
            .one(&self.db)
            .await?;

        Ok(row
            .map(|(records, uploads, bytes_stored, bytes_saved)| StoreStats {
                records,
                uploads,
                bytes_stored,
                bytes_saved,
            })
            .unwrap_or_default())
    }
}

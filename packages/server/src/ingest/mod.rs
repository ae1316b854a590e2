//! Content-addressed ingestion.
//!
//! An upload is hashed exactly once while it is spooled to disk. The digest
//! decides the path:
//!
//! * known digest: the upload counter is incremented and the spooled bytes
//!   are thrown away, the existing blob stays authoritative;
//! * new digest: the spool is copied into the blob store and a record is
//!   created. If another ingester created the record in the meantime the
//!   fresh blob is deleted and the call folds into the increment path.
//!
//! Only the record store decides which caller wins; there is no
//! application-level lock.

mod error;
mod spool;

use std::path::PathBuf;
use std::sync::Arc;

use common::storage::{BlobLocator, BlobStore, ContentHash, digest_stream};
use tokio::io::AsyncRead;
use tracing::{Span, debug, info, instrument, warn};

use crate::records::{ContentRecord, NewContentRecord, RecordStore, RecordStoreError};

pub use error::IngestError;
use spool::Spool;

/// Used when the uploader supplies no filename.
pub const DEFAULT_FILENAME: &str = "upload";

const MAX_FILENAME_CHARS: usize = 255;
const MAX_CONTENT_TYPE_CHARS: usize = 100;
const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory for in-flight uploads.
    pub spool_dir: PathBuf,
    /// Largest accepted upload in bytes.
    pub max_upload_size: u64,
}

/// Outcome of a successful ingest, identical in shape for both paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResult {
    pub record: ContentRecord,
    /// `true` if this call created the record, `false` if it matched one.
    pub created: bool,
}

pub struct IngestionService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    config: IngestConfig,
}

impl IngestionService {
    pub async fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        config: IngestConfig,
    ) -> Result<Self, IngestError> {
        tokio::fs::create_dir_all(&config.spool_dir)
            .await
            .map_err(|e| IngestError::StorageUnavailable(format!("cannot create spool dir: {e}")))?;

        Ok(Self {
            records,
            blobs,
            config,
        })
    }

    /// Ingest one upload.
    ///
    /// `filename` and `content_type` are only stored when the content is new;
    /// repeat uploads keep the first uploader's metadata.
    #[instrument(
        skip(self, reader),
        fields(digest = tracing::field::Empty, size = tracing::field::Empty)
    )]
    pub async fn ingest<R>(
        &self,
        mut reader: R,
        filename: &str,
        content_type: &str,
    ) -> Result<IngestResult, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut spool = Spool::create(&self.config.spool_dir)
            .await
            .map_err(|e| IngestError::StorageUnavailable(format!("cannot create spool: {e}")))?;

        let digest = digest_stream(&mut reader, spool.file_mut(), self.config.max_upload_size)
            .await?;

        if digest.size == 0 {
            return Err(IngestError::InvalidInput("No file content provided".into()));
        }

        let span = Span::current();
        span.record("digest", digest.hash.short().as_str());
        span.record("size", digest.size);
        debug!("upload hashed");

        if self.records.lookup(&digest.hash).await?.is_some() {
            return self.record_repeat(&digest.hash).await;
        }

        let blob_reader = spool
            .reopen()
            .await
            .map_err(|e| IngestError::StorageUnavailable(format!("cannot reopen spool: {e}")))?;
        let locator = self.blobs.put_stream(Box::new(blob_reader)).await?;
        drop(spool);

        let (original_filename, content_type) = declared_metadata(filename, content_type);
        let new_record = NewContentRecord {
            digest: digest.hash,
            locator: locator.clone(),
            original_filename,
            content_type,
            size_bytes: digest.size,
        };

        match self.records.create(new_record).await {
            Ok(record) => {
                info!(id = %record.id, "new content stored");
                Ok(IngestResult {
                    record,
                    created: true,
                })
            }
            Err(RecordStoreError::DigestConflict(_)) => {
                warn!("record created concurrently; counting as repeat upload");
                self.discard_blob(&locator).await;
                self.record_repeat(&digest.hash).await
            }
            Err(e) => {
                self.discard_blob(&locator).await;
                Err(e.into())
            }
        }
    }

    async fn record_repeat(&self, hash: &ContentHash) -> Result<IngestResult, IngestError> {
        let record = self.records.increment(hash).await?.ok_or_else(|| {
            IngestError::StorageUnavailable(format!("record for {hash} disappeared during update"))
        })?;

        info!(id = %record.id, upload_count = record.upload_count, "duplicate upload");
        Ok(IngestResult {
            record,
            created: false,
        })
    }

    async fn discard_blob(&self, locator: &BlobLocator) {
        match self.blobs.delete(locator).await {
            Ok(_) => debug!(%locator, "discarded unreferenced blob"),
            Err(e) => warn!(%locator, error = %e, "failed to discard unreferenced blob"),
        }
    }
}

/// Apply defaults and column limits to caller-declared metadata.
fn declared_metadata(filename: &str, content_type: &str) -> (String, String) {
    let filename = match filename.trim() {
        "" => DEFAULT_FILENAME.to_string(),
        name => truncate_chars(name, MAX_FILENAME_CHARS),
    };

    // Browsers declare octet-stream for anything they do not recognise.
    let content_type = match content_type.trim() {
        "" => guess_content_type(&filename),
        generic if generic.eq_ignore_ascii_case(GENERIC_CONTENT_TYPE) => {
            guess_content_type(&filename)
        }
        declared => truncate_chars(declared, MAX_CONTENT_TYPE_CHARS),
    };

    (filename, content_type)
}

fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

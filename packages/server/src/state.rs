use std::sync::Arc;

use common::storage::BlobStore;

use crate::config::AppConfig;
use crate::ingest::IngestionService;
use crate::records::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ingest: Arc<IngestionService>,
    pub records: Arc<dyn RecordStore>,
    pub blob_store: Arc<dyn BlobStore>,
}

use std::sync::Arc;

use anyhow::Context;
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::database::init_db;
use server::ingest::IngestionService;
use server::records::{RecordStore, SeaOrmRecordStore};
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to initialize database")?;

    let blob_store: Arc<dyn BlobStore> = Arc::new(
        FilesystemBlobStore::new(config.storage.blob_dir.clone(), config.storage.max_upload_size)
            .await
            .context("Failed to initialize blob store")?,
    );
    info!("Blob store at {}", config.storage.blob_dir.display());

    let records: Arc<dyn RecordStore> = Arc::new(SeaOrmRecordStore::new(db.clone()));
    let ingest = Arc::new(
        IngestionService::new(
            Arc::clone(&records),
            Arc::clone(&blob_store),
            config.storage.ingest(),
        )
        .await
        .context("Failed to initialize ingestion service")?,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        config,
        ingest,
        records,
        blob_store,
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{addr}");
    info!("Swagger UI at http://{addr}/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down");
    db.close().await.context("Failed to close database")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tempfile::TempDir;

use server::config::{AppConfig, CorsConfig, DatabaseConfig, ServerConfig, StorageConfig};
use server::ingest::IngestionService;
use server::records::{RecordStore, SeaOrmRecordStore};
use server::state::AppState;

pub const DEFAULT_MAX_UPLOAD: u64 = 1024 * 1024;

pub mod routes {
    pub const FILES: &str = "/api/v1/files";
    pub const STATS: &str = "/api/v1/files/stats";

    pub fn file(id: &str) -> String {
        format!("/api/v1/files/{id}")
    }

    pub fn file_content(id: &str) -> String {
        format!("/api/v1/files/{id}/content")
    }
}

/// A running test server backed by a throwaway SQLite database and blob directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub state: AppState,
    pub dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_limit(DEFAULT_MAX_UPLOAD).await
    }

    pub async fn spawn_with_limit(max_upload_size: u64) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("stash.db").display());

        let db = server::database::init_db(&db_url, 5)
            .await
            .expect("Failed to initialize test database");

        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: db_url,
                max_connections: 5,
            },
            storage: StorageConfig {
                blob_dir: dir.path().join("blobs"),
                spool_dir: dir.path().join("spool"),
                max_upload_size,
            },
        };

        let blob_store: Arc<dyn BlobStore> = Arc::new(
            FilesystemBlobStore::new(config.storage.blob_dir.clone(), max_upload_size)
                .await
                .expect("Failed to create blob store"),
        );
        let records: Arc<dyn RecordStore> = Arc::new(SeaOrmRecordStore::new(db.clone()));
        let ingest = Arc::new(
            IngestionService::new(
                Arc::clone(&records),
                Arc::clone(&blob_store),
                config.storage.ingest(),
            )
            .await
            .expect("Failed to create ingestion service"),
        );

        let state = AppState {
            config,
            ingest,
            records,
            blob_store,
        };

        let app = server::build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            state,
            dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn upload(&self, file_name: &str, file_bytes: Vec<u8>, mime: &str) -> TestResponse {
        let mut part = reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string());
        if !mime.is_empty() {
            part = part.mime_str(mime).expect("Failed to set MIME type");
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        self.post_form(form).await
    }

    pub async fn post_form(&self, form: reqwest::multipart::Form) -> TestResponse {
        let res = self
            .client
            .post(self.url(routes::FILES))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Number of blobs currently held by the filesystem store.
    pub fn blob_count(&self) -> usize {
        let root = self.dir.path().join("blobs");
        std::fs::read_dir(&root)
            .expect("Failed to read blob dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != ".tmp" && e.path().is_dir())
            .map(|shard| {
                std::fs::read_dir(shard.path())
                    .expect("Failed to read shard dir")
                    .count()
            })
            .sum()
    }

    /// Number of uploads still sitting in the spool directory.
    pub fn spool_count(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("spool"))
            .expect("Failed to read spool dir")
            .count()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("Response should contain an id")
            .to_string()
    }
}

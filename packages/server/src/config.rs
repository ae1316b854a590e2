use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::ingest::IngestConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins. Empty allows any origin.
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root of the filesystem blob store.
    pub blob_dir: PathBuf,
    /// Scratch directory for uploads being hashed.
    pub spool_dir: PathBuf,
    /// Largest accepted upload in bytes.
    pub max_upload_size: u64,
}

impl StorageConfig {
    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            spool_dir: self.spool_dir.clone(),
            max_upload_size: self.max_upload_size,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.max_connections", 20)?
            .set_default("storage.blob_dir", "./data/blobs")?
            .set_default("storage.spool_dir", "./data/spool")?
            .set_default("storage.max_upload_size", 128 * 1024 * 1024)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., STASH__DATABASE__URL)
            .add_source(Environment::with_prefix("STASH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{ServiceError, ServiceResult};

/// Service configuration, read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_scan")]
    pub scan: ScanConfig,

    #[serde(default = "default_queue")]
    pub queue: QueueConfig,

    /// Remote processors to register at startup
    #[serde(default)]
    pub processors: Vec<ProcessorEndpointConfig>,
}

/// Which result store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Result storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docproc.db")
    }
}

/// Document storage service (scan status) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Base URL of the storage service. Without it every document is treated as scanned.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_scan_timeout_secs")]
    pub timeout_secs: u64,
}

/// Work queue consumption configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum deliveries executing at once
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deliveries of one message before it is dead-lettered
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,
}

impl QueueConfig {
    pub fn redelivery_delay(&self) -> Duration {
        Duration::from_millis(self.redelivery_delay_ms)
    }

    /// `workers` clamped to what a semaphore can hand out, never below one
    pub fn worker_permits(&self) -> usize {
        self.workers.clamp(1, Semaphore::MAX_PERMITS)
    }
}

/// A processor reached over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorEndpointConfig {
    pub id: String,
    pub endpoint: String,

    #[serde(default = "default_processor_timeout_secs")]
    pub timeout_secs: u64,
}

/// Load configuration from `config.toml` (optional) and `DOCPROC__*` env vars
pub fn load_config() -> ServiceResult<ServiceConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("DOCPROC")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_storage() -> StorageConfig {
    StorageConfig {
        backend: default_backend(),
        data_dir: default_data_dir(),
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_scan() -> ScanConfig {
    ScanConfig {
        base_url: None,
        timeout_secs: default_scan_timeout_secs(),
    }
}

fn default_scan_timeout_secs() -> u64 {
    10
}

fn default_queue() -> QueueConfig {
    QueueConfig {
        workers: default_workers(),
        max_deliveries: default_max_deliveries(),
        redelivery_delay_ms: default_redelivery_delay_ms(),
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_redelivery_delay_ms() -> u64 {
    1000
}

fn default_processor_timeout_secs() -> u64 {
    60
}

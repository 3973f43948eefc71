//! Store settings

use std::path::PathBuf;
use std::time::Duration;

use crate::provider::{Database, DEFAULT_TIMEOUT_SECS};
use crate::store::DEFAULT_PACKET_TTL;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT_SECS;

/// Default number of concurrent tasks for a [`ParallelProcessor`](crate::scheduler::ParallelProcessor).
pub const DEFAULT_PARALLELISM: usize = 8;

/// Default on-disk cache location (`<platform cache dir>/timemachine`).
pub fn default_cache_directory() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("timemachine"))
}

/// Settings for opening a packet store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database to read.
    pub database: Database,
    /// Directory for manifests, packets and images; `None` disables the disk cache.
    pub cache_directory: Option<PathBuf>,
    /// Idle time after which a decoded packet is dropped from memory.
    pub packet_ttl: Duration,
    /// HTTP request timeout in seconds.
    pub http_timeout_secs: u64,
    /// Concurrency bound for callers that fan out with the scheduler.
    pub parallelism: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: Database::default(),
            cache_directory: default_cache_directory(),
            packet_ttl: DEFAULT_PACKET_TTL,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl StoreConfig {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            ..Self::default()
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = database;
        self
    }

    pub fn with_cache_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.cache_directory = directory;
        self
    }

    pub fn with_packet_ttl(mut self, ttl: Duration) -> Self {
        self.packet_ttl = ttl;
        self
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }
}

//! SQLite connection configuration

use lantern_config::StorageConfig;
use std::path::{Path, PathBuf};

/// Settings applied when the connection is opened
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    /// Enable write-ahead logging
    pub wal_mode: bool,
    /// Enforce foreign keys
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
    /// Page cache size (negative values are KiB)
    pub cache_size: i64,
    /// Memory-mapped I/O size in bytes, 0 disables
    pub mmap_size: u64,
}

impl SqliteConfig {
    /// File-backed database with default settings
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::from(&StorageConfig::default())
        }
    }

    /// In-memory database, for tests
    pub fn memory() -> Self {
        Self::from(&StorageConfig::memory())
    }

    /// Whether this configuration opens an in-memory database
    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(":memory:")
    }
}

impl From<&StorageConfig> for SqliteConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            path: storage.path.clone(),
            wal_mode: storage.wal_mode,
            foreign_keys: storage.foreign_keys,
            busy_timeout_ms: storage.busy_timeout_ms,
            cache_size: storage.cache_size,
            mmap_size: storage.mmap_size,
        }
    }
}

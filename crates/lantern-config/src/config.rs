//! Configuration types

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanternConfig {
    /// SQLite storage settings
    pub storage: StorageConfig,
    /// Indexing and search behaviour
    pub indexing: IndexingConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

impl LanternConfig {
    /// Configuration backed by an in-memory database, for tests and tools
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig::memory(),
            ..Self::default()
        }
    }

    /// Reject values that would make the stores misbehave
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.path must not be empty".into()));
        }
        if self.indexing.search_page_size == 0 {
            return Err(ConfigError::Invalid(
                "indexing.search_page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    /// Enable write-ahead logging
    pub wal_mode: bool,
    /// Enforce foreign keys
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
    /// Page cache size (negative values are KiB, as in SQLite)
    pub cache_size: i64,
    /// Memory-mapped I/O size in bytes, 0 disables
    pub mmap_size: u64,
}

impl StorageConfig {
    /// In-memory database
    pub fn memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: false,
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lantern.db"),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_ms: 5000,
            cache_size: -64000,
            mmap_size: 0,
        }
    }
}

/// How index mutations for one `index` call are grouped into store transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// One transaction per label: readers of a label's index see the old or
    /// the new records, never a mix
    #[default]
    PerLabel,
    /// One transaction covering every label of the entity
    PerEntity,
    /// No transactions; each store operation commits on its own
    None,
}

impl IsolationLevel {
    /// Name used in config files and environment variables
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerLabel => "per_label",
            Self::PerEntity => "per_entity",
            Self::None => "none",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_label" => Ok(Self::PerLabel),
            "per_entity" => Ok(Self::PerEntity),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Invalid(format!(
                "unknown isolation level `{}` (expected per_label, per_entity or none)",
                other
            ))),
        }
    }
}

/// Indexing and search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Transaction grouping for re-index writes
    pub isolation: IsolationLevel,
    /// Number of hits fetched per page while a search result is consumed
    pub search_page_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::default(),
            search_page_size: 64,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line human readable output
    #[default]
    Pretty,
    /// Single-line human readable output
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `lantern_core=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LanternConfig::default();
        assert_eq!(config.storage.path, PathBuf::from("lantern.db"));
        assert!(config.storage.wal_mode);
        assert_eq!(config.indexing.isolation, IsolationLevel::PerLabel);
        assert_eq!(config.indexing.search_page_size, 64);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_in_memory_disables_wal() {
        let config = LanternConfig::in_memory();
        assert_eq!(config.storage.path, PathBuf::from(":memory:"));
        assert!(!config.storage.wal_mode);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = LanternConfig::default();
        config.indexing.search_page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let mut config = LanternConfig::default();
        config.storage.path = PathBuf::new();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_isolation_level_parsing() {
        assert_eq!("per_label".parse::<IsolationLevel>().unwrap(), IsolationLevel::PerLabel);
        assert_eq!("Per-Entity".parse::<IsolationLevel>().unwrap(), IsolationLevel::PerEntity);
        assert_eq!(" none ".parse::<IsolationLevel>().unwrap(), IsolationLevel::None);
        assert!("serializable".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_isolation_level_round_trips_through_display() {
        for level in [IsolationLevel::PerLabel, IsolationLevel::PerEntity, IsolationLevel::None] {
            assert_eq!(level.to_string().parse::<IsolationLevel>().unwrap(), level);
        }
    }
}

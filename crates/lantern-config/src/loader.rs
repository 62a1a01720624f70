//! Configuration loading from files and the environment

use crate::config::LanternConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding `storage.path`
pub const ENV_DB_PATH: &str = "LANTERN_DB_PATH";
/// Environment variable overriding `indexing.isolation`
pub const ENV_ISOLATION: &str = "LANTERN_ISOLATION";
/// Environment variable overriding `indexing.search_page_size`
pub const ENV_SEARCH_PAGE_SIZE: &str = "LANTERN_SEARCH_PAGE_SIZE";
/// Environment variable overriding `logging.level`
pub const ENV_LOG: &str = "LANTERN_LOG";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (`.toml`)
    #[cfg(feature = "toml")]
    Toml,
    /// YAML (`.yaml`, `.yml`)
    #[cfg(feature = "yaml")]
    Yaml,
    /// JSON (`.json`)
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            #[cfg(feature = "toml")]
            "toml" => Ok(Self::Toml),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "toml")]
            Self::Toml => "toml",
            #[cfg(feature = "yaml")]
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// Loads [`LanternConfig`] from files, strings and environment variables
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load, apply environment overrides and validate
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<LanternConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::load_from_str(&content, format)?;
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration content in the given format
    pub fn load_from_str(content: &str, format: ConfigFormat) -> ConfigResult<LanternConfig> {
        let parse_err = |message: String| ConfigError::Parse {
            format: format.name(),
            message,
        };

        match format {
            #[cfg(feature = "toml")]
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
            #[cfg(feature = "yaml")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))
            }
        }
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> ConfigResult<LanternConfig> {
        let mut config = LanternConfig::default();
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `LANTERN_*` environment variables onto `config`
    pub fn apply_env_overrides(config: &mut LanternConfig) -> ConfigResult<()> {
        if let Some(path) = env_var(ENV_DB_PATH) {
            debug!(path = %path, "Overriding storage.path from environment");
            config.storage.path = PathBuf::from(path);
        }

        if let Some(level) = env_var(ENV_ISOLATION) {
            config.indexing.isolation = level.parse()?;
        }

        if let Some(size) = env_var(ENV_SEARCH_PAGE_SIZE) {
            config.indexing.search_page_size = size.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a positive integer, got `{}`",
                    ENV_SEARCH_PAGE_SIZE, size
                ))
            })?;
        }

        if let Some(level) = env_var(ENV_LOG) {
            config.logging.level = level;
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IsolationLevel, LogFormat};

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        #[cfg(feature = "toml")]
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        #[cfg(feature = "yaml")]
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("a.ini")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(ConfigFormat::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_json_partial_document_uses_defaults() {
        let config = ConfigLoader::load_from_str(
            r#"{"indexing": {"isolation": "per_entity"}}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(config.indexing.isolation, IsolationLevel::PerEntity);
        assert_eq!(config.indexing.search_page_size, 64);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_document() {
        let config = ConfigLoader::load_from_str(
            r#"
            [storage]
            path = "/var/lib/lantern/graph.db"
            busy_timeout_ms = 250

            [indexing]
            isolation = "none"
            search_page_size = 10

            [logging]
            level = "lantern_core=debug"
            format = "json"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.storage.path, PathBuf::from("/var/lib/lantern/graph.db"));
        assert_eq!(config.storage.busy_timeout_ms, 250);
        assert!(config.storage.wal_mode);
        assert_eq!(config.indexing.isolation, IsolationLevel::None);
        assert_eq!(config.indexing.search_page_size, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml_document() {
        let config = ConfigLoader::load_from_str(
            "indexing:\n  isolation: per_label\n  search_page_size: 5\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(config.indexing.search_page_size, 5);
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = ConfigLoader::load_from_str("{ not json", ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn test_unknown_isolation_is_rejected() {
        let result = ConfigLoader::load_from_str(
            r#"{"indexing": {"isolation": "serializable"}}"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}

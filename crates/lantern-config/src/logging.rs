//! Tracing subscriber set-up
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is left to the embedding application, which can use
//! [`init_logging`] to do it from a [`LoggingConfig`].

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ConfigError, ConfigResult};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Invalid(format!("logging.level `{}`: {}", config.level, e))),
    }
}

/// Install a global fmt subscriber
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

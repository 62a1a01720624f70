//! # Lantern Configuration Library
//!
//! Typed configuration for the Lantern full-text indexing layer, plus the
//! loader and logging set-up shared by applications embedding it.
//!
//! ## Features
//!
//! - Multi-format support (TOML, YAML, JSON)
//! - Environment variable overrides (`LANTERN_*`)
//! - Validation of loaded values
//! - `tracing-subscriber` initialisation from [`LoggingConfig`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lantern_config::{ConfigLoader, logging};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("lantern.toml")?;
//!     logging::init_logging(&config.logging)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod loader;
pub mod logging;

pub use config::*;
pub use error::{ConfigError, ConfigResult};
pub use loader::*;

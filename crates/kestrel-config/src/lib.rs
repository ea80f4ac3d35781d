//! Kestrel Configuration System
//!
//! Provides configuration for the Kestrel runtime, most importantly the
//! policy knobs of the exception backtrace engine:
//! - Project configuration (kestrel.toml)
//! - Global user configuration (~/.kestrel/config.toml)
//! - Environment variable overrides (KESTREL_*)
//! - A fully resolved [`RuntimeConfig`] with every default filled in
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.kestrel/config.toml)
//! 3. Project config (./kestrel.toml)
//! 4. Environment variables (KESTREL_*)
//!
//! # Example
//!
//! ```no_run
//! use kestrel_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! let runtime = config.runtime();
//! assert!(runtime.backtrace.chunk_size > 0);
//! ```

pub mod global;
pub mod loader;
pub mod project;
pub mod runtime;
pub mod sections;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::ProjectConfig;
pub use runtime::{BacktraceConfig, HeapConfig, RuntimeConfig};
pub use sections::{BacktraceSection, HeapSection};

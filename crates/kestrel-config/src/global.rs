//! Global Configuration (~/.kestrel/config.toml)
//!
//! Handles user-level configuration stored in `~/.kestrel/config.toml`.

use crate::sections::{BacktraceSection, HeapSection};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.kestrel/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Backtrace capture policy defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<BacktraceSection>,

    /// Managed heap defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap: Option<HeapSection>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(backtrace) = &self.backtrace {
            backtrace.validate()?;
        }
        if let Some(heap) = &self.heap {
            heap.validate()?;
        }
        Ok(())
    }

    /// Get the global config file path (~/.kestrel/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".kestrel").join("config.toml"))
    }

    /// Merge another global config into this one
    /// Other config takes precedence for set values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if let Some(backtrace) = &other.backtrace {
            self.backtrace
                .get_or_insert_with(BacktraceSection::default)
                .merge(backtrace);
        }
        if let Some(heap) = &other.heap {
            self.heap.get_or_insert_with(HeapSection::default).merge(heap);
        }
    }
}

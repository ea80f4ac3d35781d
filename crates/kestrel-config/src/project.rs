//! Project Configuration (kestrel.toml)
//!
//! Handles project-level configuration stored in `kestrel.toml` at the project root.

use crate::sections::{BacktraceSection, HeapSection};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name searched for when locating a project
pub const PROJECT_CONFIG_FILE: &str = "kestrel.toml";

/// Project configuration from kestrel.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Backtrace capture policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<BacktraceSection>,

    /// Managed heap limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap: Option<HeapSection>,
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(backtrace) = &self.backtrace {
            backtrace.validate()?;
        }
        if let Some(heap) = &self.heap {
            heap.validate()?;
        }
        Ok(())
    }

    /// Backtrace section, created empty on first use
    pub fn backtrace_mut(&mut self) -> &mut BacktraceSection {
        self.backtrace.get_or_insert_with(BacktraceSection::default)
    }
}

//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{ProjectConfig, PROJECT_CONFIG_FILE};
use crate::runtime::RuntimeConfig;
use crate::sections::{parse_flag, validate_chunk_size};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.kestrel/config.toml) - lowest priority
/// 2. Project config (./kestrel.toml) - overrides global
/// 3. Environment variables (KESTREL_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where kestrel.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads the global layer from an explicit path
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find kestrel.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        // Global config is optional, and a missing home directory is not fatal
        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); default config when none is found
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.kestrel/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognized variables:
    /// - KESTREL_STACK_TRACES=true|false
    /// - KESTREL_MAX_STACK_TRACE_DEPTH=<frames>
    /// - KESTREL_SHOW_HIDDEN_FRAMES=true|false
    /// - KESTREL_TRACE_CHUNK_SIZE=<frames>
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(enabled) = env::var("KESTREL_STACK_TRACES") {
            config.backtrace_mut().enabled = Some(parse_flag(&enabled));
        }

        if let Ok(depth) = env::var("KESTREL_MAX_STACK_TRACE_DEPTH") {
            let depth = parse_count("KESTREL_MAX_STACK_TRACE_DEPTH", &depth)?;
            config.backtrace_mut().max_depth = Some(depth);
        }

        if let Ok(show) = env::var("KESTREL_SHOW_HIDDEN_FRAMES") {
            config.backtrace_mut().show_hidden_frames = Some(parse_flag(&show));
        }

        if let Ok(size) = env::var("KESTREL_TRACE_CHUNK_SIZE") {
            let size = parse_count("KESTREL_TRACE_CHUNK_SIZE", &size)?;
            validate_chunk_size(size)?;
            config.backtrace_mut().chunk_size = Some(size);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_count(field: &str, value: &str) -> ConfigResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a non-negative integer, got '{}' ({})", value, e),
        })
}

impl Config {
    /// Resolve all layers into concrete runtime settings
    ///
    /// Precedence: defaults < global < project (including environment overrides)
    pub fn runtime(&self) -> RuntimeConfig {
        let mut runtime = RuntimeConfig::default();

        if let Some(backtrace) = &self.global.backtrace {
            runtime.backtrace.apply(backtrace);
        }
        if let Some(heap) = &self.global.heap {
            runtime.heap.apply(heap);
        }
        if let Some(backtrace) = &self.project.backtrace {
            runtime.backtrace.apply(backtrace);
        }
        if let Some(heap) = &self.project.heap {
            runtime.heap.apply(heap);
        }

        runtime
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has kestrel.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

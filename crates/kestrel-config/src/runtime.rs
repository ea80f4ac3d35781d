//! Resolved runtime configuration
//!
//! The file layers only carry optional overrides; this module folds them over
//! the built-in defaults into concrete values the runtime can consume.

use crate::sections::{validate_chunk_size, BacktraceSection, HeapSection};
use crate::ConfigResult;

/// Default cap on recorded frames per throwable
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default number of frames per backtrace chunk
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Default size of the preallocated out-of-memory error pool
pub const DEFAULT_PREALLOCATED_ERRORS: usize = 4;

/// Backtrace capture policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceConfig {
    /// Capture stack traces at all
    pub enabled: bool,
    /// Maximum number of recorded frames (0 = unlimited)
    pub max_depth: usize,
    /// Frames per store chunk
    pub chunk_size: usize,
    /// Record hidden frames instead of suppressing them
    pub show_hidden_frames: bool,
    /// Out-of-memory errors preallocated with a backtrace
    pub preallocated_errors: usize,
}

impl Default for BacktraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: DEFAULT_MAX_DEPTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_hidden_frames: false,
            preallocated_errors: DEFAULT_PREALLOCATED_ERRORS,
        }
    }
}

impl BacktraceConfig {
    /// Apply the set values of a configuration section
    pub fn apply(&mut self, section: &BacktraceSection) {
        if let Some(enabled) = section.enabled {
            self.enabled = enabled;
        }
        if let Some(max_depth) = section.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(chunk_size) = section.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(show) = section.show_hidden_frames {
            self.show_hidden_frames = show;
        }
        if let Some(count) = section.preallocated_errors {
            self.preallocated_errors = count;
        }
    }
}

/// Managed heap limits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapConfig {
    /// Upper bound for managed allocations, `None` = unbounded
    pub limit_bytes: Option<usize>,
}

impl HeapConfig {
    /// Apply the set values of a configuration section
    pub fn apply(&mut self, section: &HeapSection) {
        if section.limit_bytes.is_some() {
            self.limit_bytes = section.limit_bytes;
        }
    }
}

/// Fully resolved configuration handed to the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub backtrace: BacktraceConfig,
    pub heap: HeapConfig,
}

impl RuntimeConfig {
    /// A configuration with small chunks, handy for exercising chunk boundaries
    pub fn for_testing() -> Self {
        Self {
            backtrace: BacktraceConfig {
                chunk_size: 4,
                preallocated_errors: 2,
                ..BacktraceConfig::default()
            },
            heap: HeapConfig::default(),
        }
    }

    /// Check value ranges of a configuration built by hand
    pub fn validate(&self) -> ConfigResult<()> {
        validate_chunk_size(self.backtrace.chunk_size)
    }
}

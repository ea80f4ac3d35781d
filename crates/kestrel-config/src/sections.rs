//! Configuration sections shared by the project and global files.
//!
//! Every field is optional so that a layer only overrides what it names.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Largest chunk capacity the backtrace store can address.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// `[backtrace]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BacktraceSection {
    /// Capture stack traces into throwables at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Maximum number of recorded frames (0 = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Frames per store chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Record frames of hidden (implementation) methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_hidden_frames: Option<bool>,

    /// Number of out-of-memory errors preallocated with their own backtrace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preallocated_errors: Option<usize>,
}

/// `[heap]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HeapSection {
    /// Upper bound for managed allocations, in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_bytes: Option<usize>,
}

impl BacktraceSection {
    /// Validate value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(chunk_size) = self.chunk_size {
            validate_chunk_size(chunk_size)?;
        }
        Ok(())
    }

    /// Merge another section into this one; set values in `other` win
    pub fn merge(&mut self, other: &BacktraceSection) {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.max_depth.is_some() {
            self.max_depth = other.max_depth;
        }
        if other.chunk_size.is_some() {
            self.chunk_size = other.chunk_size;
        }
        if other.show_hidden_frames.is_some() {
            self.show_hidden_frames = other.show_hidden_frames;
        }
        if other.preallocated_errors.is_some() {
            self.preallocated_errors = other.preallocated_errors;
        }
    }
}

impl HeapSection {
    /// Validate value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.limit_bytes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "heap.limit_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Merge another section into this one; set values in `other` win
    pub fn merge(&mut self, other: &HeapSection) {
        if other.limit_bytes.is_some() {
            self.limit_bytes = other.limit_bytes;
        }
    }
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> ConfigResult<()> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(ConfigError::InvalidValue {
            field: "backtrace.chunk_size".to_string(),
            reason: format!("must be between 1 and {}, got {}", MAX_CHUNK_SIZE, chunk_size),
        });
    }
    Ok(())
}

/// Parse a boolean-ish environment value ("true", "1", "yes", "on")
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

//! Compiled code and its debug info
//!
//! - `stream` - compressed integer streams
//! - `compiled` - compiled methods, pc descriptors and scope records

pub mod compiled;
pub mod stream;

pub use compiled::{CompiledMethod, CompiledMethodBuilder, PcDesc, ScopeDesc, NULL_SCOPE};
pub use stream::{
    CompressedReadStream, CompressedWriteStream, DebugInfoError, SYNCHRONIZATION_ENTRY_BCI,
};

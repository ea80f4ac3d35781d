//! Kestrel Runtime - exception backtraces
//!
//! This library captures and materializes exception stack traces:
//! - Chunked, heap-accounted backtrace storage
//! - Stack walking over interpreted, compiled and inlined frames
//! - Filtering of exception-construction and hidden frames
//! - Replay and materialization that tolerates class redefinition
//!
//! It also carries the narrow runtime models the engine relies on: symbols,
//! classes and methods, compiled-code debug info, thread stacks, the managed
//! heap budget and no-safepoint scopes.

/// Kestrel runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod backtrace;
pub mod code;
pub mod dictionary;
pub mod exception;
pub mod heap;
pub mod oops;
pub mod safepoint;
pub mod symbol;
pub mod thread;
pub mod universe;

// Re-export commonly used types
pub use backtrace::{
    fill_in_stack_trace, fill_in_stack_trace_of_preallocated_backtrace, get_stack_trace_elements,
    get_top_method_and_bci, print_stack_trace, stack_trace, Backtrace, BacktraceBuilder,
    BacktraceElement, BacktraceIterator, FrameStatus, StackTraceElement, TraceError, TraceResult,
};
pub use code::{CompiledMethod, DebugInfoError};
pub use dictionary::{ClassRegistry, RegistryError};
pub use exception::Throwable;
pub use heap::{Heap, HeapError};
pub use oops::{ClassDefinition, Klass, Method, MethodSpec, Mirror};
pub use symbol::{Symbol, SymbolTable};
pub use thread::{Frame, ManagedThread};
pub use universe::Universe;

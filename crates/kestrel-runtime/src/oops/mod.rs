//! Runtime representation of classes and methods
//!
//! - `klass` - classes, their versions and mirrors
//! - `method` - methods and line number tables

pub mod klass;
pub mod method;

pub use klass::{ClassDefinition, ClassVersion, Klass, Mirror, ModuleInfo};
pub use method::{LineNumberEntry, Method, MethodFlags, MethodSpec, MAX_CODE_SIZE, UNKNOWN_LINE};

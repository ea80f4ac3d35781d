//! Method metadata
//!
//! A [`Method`] belongs to exactly one version of its declaring class. Its
//! `ordinal` is stable across redefinition; its `generation` is the class
//! version it was loaded with and never changes.

use super::klass::Klass;
use crate::symbol::{Symbol, SymbolTable};
use std::fmt;
use std::sync::{Arc, Weak};

/// Line number reported when a method has no usable line table
pub const UNKNOWN_LINE: i32 = -1;

/// Largest bytecode body a method may have; every bci fits 16 bits
pub const MAX_CODE_SIZE: u32 = 1 << 16;

/// One entry of a method's line number table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub bci: u16,
    pub line: u16,
}

/// Method attribute flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodFlags {
    /// Implemented outside managed code; has no bytecode
    pub is_native: bool,
    /// Implementation detail frames suppressed from user-visible traces
    pub is_hidden: bool,
    pub is_static: bool,
}

/// Loaded method
pub struct Method {
    ordinal: u16,
    name: Symbol,
    signature: Symbol,
    generation: u32,
    flags: MethodFlags,
    code_size: u32,
    line_numbers: Box<[LineNumberEntry]>,
    holder: Weak<Klass>,
}

impl Method {
    pub(crate) fn from_spec(
        spec: &MethodSpec,
        ordinal: u16,
        generation: u32,
        holder: Weak<Klass>,
        symbols: &SymbolTable,
    ) -> Self {
        Self {
            ordinal,
            name: symbols.intern(&spec.name),
            signature: symbols.intern(&spec.signature),
            generation,
            flags: spec.flags,
            code_size: if spec.flags.is_native { 0 } else { spec.code_size },
            line_numbers: spec.line_numbers.clone().into_boxed_slice(),
            holder,
        }
    }

    /// Stable ordinal within the declaring class
    pub fn ordinal(&self) -> u16 {
        self.ordinal
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    /// Class version this method was loaded with
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_native(&self) -> bool {
        self.flags.is_native
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.is_hidden
    }

    pub fn code_size(&self) -> u32 {
        self.code_size
    }

    /// Declaring class
    ///
    /// `None` only once the class has been dropped entirely, which cannot
    /// happen while anything (a frame, a backtrace) still refers to it.
    pub fn holder(&self) -> Option<Arc<Klass>> {
        self.holder.upgrade()
    }

    pub fn has_line_number_table(&self) -> bool {
        !self.line_numbers.is_empty()
    }

    pub fn line_numbers(&self) -> &[LineNumberEntry] {
        &self.line_numbers
    }

    /// Source line for a bytecode index
    ///
    /// An exact table hit wins; otherwise the closest entry starting at or
    /// before `bci`. Returns [`UNKNOWN_LINE`] when there is no table or the
    /// index lies outside the method's code.
    pub fn line_number_from_bci(&self, bci: i32) -> i32 {
        let bci = bci.max(0);
        if bci as u32 >= self.code_size || !self.has_line_number_table() {
            return UNKNOWN_LINE;
        }

        let mut best_bci = 0i32;
        let mut best_line = UNKNOWN_LINE;
        for entry in self.line_numbers.iter() {
            let entry_bci = i32::from(entry.bci);
            if entry_bci == bci {
                return i32::from(entry.line);
            }
            if entry_bci < bci && entry_bci >= best_bci {
                best_bci = entry_bci;
                best_line = i32::from(entry.line);
            }
        }
        best_line
    }

    /// `Class.method` using the external class name
    pub fn external_name(&self) -> String {
        match self.holder() {
            Some(holder) => format!("{}.{}", holder.external_name(), self.name),
            None => format!("<unloaded>.{}", self.name),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.external_name())
            .field("ordinal", &self.ordinal)
            .field("generation", &self.generation)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Definition of a method, used to load or redefine a class
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub name: String,
    pub signature: String,
    pub flags: MethodFlags,
    pub code_size: u32,
    pub line_numbers: Vec<LineNumberEntry>,
}

impl MethodSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            signature: "()V".to_string(),
            flags: MethodFlags::default(),
            code_size: 1,
            line_numbers: Vec::new(),
        }
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = signature.to_string();
        self
    }

    pub fn native(mut self) -> Self {
        self.flags.is_native = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.flags.is_hidden = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.flags.is_static = true;
        self
    }

    pub fn code_size(mut self, code_size: u32) -> Self {
        self.code_size = code_size;
        self
    }

    /// Add a line table entry; grows `code_size` to cover `bci`
    pub fn line(mut self, bci: u16, line: u16) -> Self {
        self.line_numbers.push(LineNumberEntry { bci, line });
        self.code_size = self.code_size.max(u32::from(bci) + 1);
        self
    }
}

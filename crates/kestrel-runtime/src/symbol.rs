//! Interned symbols
//!
//! Names of classes, methods and source files are interned once and shared by
//! reference. Backtraces store the method name as a [`Symbol`] so the name
//! survives even when the method object it came from is redefined away.

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An interned, immutable string
///
/// Cloning is a reference-count bump. Two symbols produced by the same
/// [`SymbolTable`] for equal text share one allocation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a free-standing symbol (not registered in any table)
    pub fn new(text: &str) -> Self {
        Symbol(Arc::from(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity comparison: true when both symbols share one allocation
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Symbol {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Symbol interner
///
/// Thread-safe; lookups and insertions take a short lock.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Mutex<HashSet<Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical symbol for `text`, creating it on first use
    pub fn intern(&self, text: &str) -> Symbol {
        let mut symbols = self.symbols.lock();
        if let Some(existing) = symbols.get(text) {
            return existing.clone();
        }
        let symbol = Symbol::new(text);
        symbols.insert(symbol.clone());
        symbol
    }

    /// Look up a symbol without creating it
    pub fn probe(&self, text: &str) -> Option<Symbol> {
        self.symbols.lock().get(text).cloned()
    }

    pub fn len(&self) -> usize {
        self.symbols.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Names the runtime itself needs to recognize
#[derive(Debug, Clone)]
pub struct VmSymbols {
    /// The routine that captures the current stack into a throwable
    pub fill_in_stack_trace: Symbol,
    /// Instance initializer (constructor) name
    pub object_initializer: Symbol,
}

impl VmSymbols {
    pub fn new(table: &SymbolTable) -> Self {
        Self {
            fill_in_stack_trace: table.intern("fillInStackTrace"),
            object_initializer: table.intern("<init>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_shared_symbol() {
        let table = SymbolTable::new();
        let a = table.intern("run");
        let b = table.intern("run");
        assert!(a.ptr_eq(&b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_free_symbol_not_identical() {
        let table = SymbolTable::new();
        let interned = table.intern("run");
        let free = Symbol::new("run");
        assert_eq!(interned, free);
        assert!(!interned.ptr_eq(&free));
    }

    #[test]
    fn test_probe() {
        let table = SymbolTable::new();
        assert!(table.probe("missing").is_none());
        table.intern("present");
        assert_eq!(table.probe("present").unwrap().as_str(), "present");
    }

    #[test]
    fn test_vm_symbols() {
        let table = SymbolTable::new();
        let symbols = VmSymbols::new(&table);
        assert!(symbols.object_initializer.ptr_eq(&table.intern("<init>")));
    }
}

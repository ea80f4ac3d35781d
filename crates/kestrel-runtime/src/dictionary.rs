//! Loaded class registry
//!
//! The registry is the owner of record for loaded classes. Unloading removes
//! the registry's reference only; anything else still holding the class
//! (notably a backtrace's mirrors) keeps it alive.

use crate::oops::{ClassDefinition, Klass, MethodSpec, MAX_CODE_SIZE};
use crate::symbol::SymbolTable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("class {0} is already defined")]
    DuplicateClass(String),

    #[error("class {0} is not loaded")]
    UnknownClass(String),

    #[error("method {class}.{method} has {code_size} bytes of code, limit is 65536")]
    CodeTooLarge {
        class: String,
        method: String,
        code_size: u32,
    },
}

fn check_code_size(class: &str, methods: &[MethodSpec]) -> Result<(), RegistryError> {
    let oversized = methods
        .iter()
        .find(|spec| !spec.flags.is_native && spec.code_size > MAX_CODE_SIZE);
    match oversized {
        Some(spec) => Err(RegistryError::CodeTooLarge {
            class: class.to_string(),
            method: spec.name.clone(),
            code_size: spec.code_size,
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, Arc<Klass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a class
    pub fn define(
        &self,
        definition: &ClassDefinition,
        symbols: &SymbolTable,
    ) -> Result<Arc<Klass>, RegistryError> {
        check_code_size(&definition.name, &definition.methods)?;
        let mut classes = self.classes.write();
        if classes.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateClass(definition.name.clone()));
        }
        let klass = Klass::define(definition, symbols);
        classes.insert(definition.name.clone(), Arc::clone(&klass));
        tracing::debug!(class = %klass.external_name(), "class defined");
        Ok(klass)
    }

    /// Register an already built class, replacing any class of the same name
    pub(crate) fn insert(&self, klass: Arc<Klass>) {
        self.classes
            .write()
            .insert(klass.name().to_string(), klass);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Klass>> {
        self.classes.read().get(name).cloned()
    }

    /// Install new code for a loaded class; returns the new generation
    pub fn redefine(
        &self,
        name: &str,
        methods: &[MethodSpec],
        source_file: Option<&str>,
        symbols: &SymbolTable,
    ) -> Result<u32, RegistryError> {
        let klass = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownClass(name.to_string()))?;
        check_code_size(name, methods)?;
        Ok(klass.redefine(methods, source_file, symbols))
    }

    /// Forget a class
    pub fn unload(&self, name: &str) -> Result<Arc<Klass>, RegistryError> {
        let klass = self
            .classes
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownClass(name.to_string()))?;
        tracing::debug!(class = %klass.external_name(), "class unloaded");
        Ok(klass)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

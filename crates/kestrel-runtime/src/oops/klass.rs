//! Runtime class representation
//!
//! A [`Klass`] owns a chain of [`ClassVersion`]s. Redefinition installs a new
//! current version with a bumped generation and keeps the old one as a
//! previous version until [`Klass::purge_previous_versions`] drops it. Method
//! ordinals are preserved across versions by matching name and signature.

use super::method::{Method, MethodSpec};
use crate::symbol::{Symbol, SymbolTable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Named module a class belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: Symbol,
    pub version: Option<Symbol>,
}

/// One generation of a class's code
#[derive(Debug)]
pub struct ClassVersion {
    generation: u32,
    source_file: Option<Symbol>,
    methods: Vec<Arc<Method>>,
}

impl ClassVersion {
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn source_file(&self) -> Option<&Symbol> {
        self.source_file.as_ref()
    }

    pub fn methods(&self) -> &[Arc<Method>] {
        &self.methods
    }

    fn method_with_ordinal(&self, ordinal: u16) -> Option<Arc<Method>> {
        self.methods
            .iter()
            .find(|m| m.ordinal() == ordinal)
            .cloned()
    }
}

#[derive(Debug)]
struct Versions {
    current: Arc<ClassVersion>,
    previous: Vec<Arc<ClassVersion>>,
    next_ordinal: u16,
}

/// Loaded class
pub struct Klass {
    name: Symbol,
    external_name: OnceLock<Symbol>,
    super_klass: Option<Arc<Klass>>,
    loader_name: Option<Symbol>,
    module: Option<ModuleInfo>,
    versions: RwLock<Versions>,
}

impl Klass {
    /// Load a class from its definition (generation 0)
    pub fn define(definition: &ClassDefinition, symbols: &SymbolTable) -> Arc<Klass> {
        Arc::new_cyclic(|weak| {
            let methods: Vec<Arc<Method>> = definition
                .methods
                .iter()
                .enumerate()
                .map(|(index, spec)| {
                    let ordinal = ordinal_from_index(index);
                    Arc::new(Method::from_spec(spec, ordinal, 0, weak.clone(), symbols))
                })
                .collect();
            let next_ordinal = ordinal_from_index(methods.len());

            Klass {
                name: symbols.intern(&definition.name),
                external_name: OnceLock::new(),
                super_klass: definition.super_klass.clone(),
                loader_name: definition.loader_name.as_deref().map(|n| symbols.intern(n)),
                module: definition.module.as_ref().map(|(name, version)| ModuleInfo {
                    name: symbols.intern(name),
                    version: version.as_deref().map(|v| symbols.intern(v)),
                }),
                versions: RwLock::new(Versions {
                    current: Arc::new(ClassVersion {
                        generation: 0,
                        source_file: definition.source_file.as_deref().map(|f| symbols.intern(f)),
                        methods,
                    }),
                    previous: Vec::new(),
                    next_ordinal,
                }),
            }
        })
    }

    /// Replace the class's code with a new version
    ///
    /// Methods keep their ordinal when a method with the same name and
    /// signature existed before; new methods get fresh ordinals. Returns the
    /// new generation.
    pub fn redefine(
        self: &Arc<Self>,
        methods: &[MethodSpec],
        source_file: Option<&str>,
        symbols: &SymbolTable,
    ) -> u32 {
        let mut versions = self.versions.write();
        let generation = versions.current.generation + 1;

        let existing: HashMap<(&str, &str), u16> = versions
            .current
            .methods
            .iter()
            .map(|m| ((m.name().as_str(), m.signature().as_str()), m.ordinal()))
            .collect();

        let mut next_ordinal = versions.next_ordinal;
        let redefined: Vec<Arc<Method>> = methods
            .iter()
            .map(|spec| {
                let ordinal = match existing.get(&(spec.name.as_str(), spec.signature.as_str())) {
                    Some(ordinal) => *ordinal,
                    None => {
                        let ordinal = next_ordinal;
                        next_ordinal = ordinal_from_index(usize::from(next_ordinal) + 1);
                        ordinal
                    }
                };
                Arc::new(Method::from_spec(
                    spec,
                    ordinal,
                    generation,
                    Arc::downgrade(self),
                    symbols,
                ))
            })
            .collect();
        drop(existing);

        let new_version = Arc::new(ClassVersion {
            generation,
            source_file: source_file.map(|f| symbols.intern(f)),
            methods: redefined,
        });
        let old = std::mem::replace(&mut versions.current, new_version);
        versions.previous.push(old);
        versions.next_ordinal = next_ordinal;

        tracing::debug!(class = %self.external_name(), generation, "class redefined");
        generation
    }

    /// Drop all previous versions; their methods can no longer be resolved
    pub fn purge_previous_versions(&self) {
        self.versions.write().previous.clear();
    }

    /// Internal name, e.g. `com/acme/Widget`
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Dotted name, e.g. `com.acme.Widget`
    pub fn external_name(&self) -> &Symbol {
        // Racing initializers compute the same value; whichever lands first wins.
        self.external_name
            .get_or_init(|| Symbol::new(&self.name.replace('/', ".")))
    }

    pub fn super_klass(&self) -> Option<&Arc<Klass>> {
        self.super_klass.as_ref()
    }

    pub fn loader_name(&self) -> Option<&Symbol> {
        self.loader_name.as_ref()
    }

    pub fn module(&self) -> Option<&ModuleInfo> {
        self.module.as_ref()
    }

    pub fn current_generation(&self) -> u32 {
        self.versions.read().current.generation
    }

    /// Number of retained previous versions
    pub fn previous_version_count(&self) -> usize {
        self.versions.read().previous.len()
    }

    /// The class version with the given generation, if still retained
    pub fn version(&self, generation: u32) -> Option<Arc<ClassVersion>> {
        let versions = self.versions.read();
        if versions.current.generation == generation {
            return Some(Arc::clone(&versions.current));
        }
        versions
            .previous
            .iter()
            .find(|v| v.generation == generation)
            .cloned()
    }

    /// Resolve a method by stable ordinal within the given generation
    pub fn method_with_ordinal(&self, ordinal: u16, generation: u32) -> Option<Arc<Method>> {
        self.version(generation)?.method_with_ordinal(ordinal)
    }

    /// Find a method of the current version by name
    pub fn find_method(&self, name: &str) -> Option<Arc<Method>> {
        self.versions
            .read()
            .current
            .methods
            .iter()
            .find(|m| m.name().as_str() == name)
            .cloned()
    }

    /// Source file name, reported only while `generation` is current
    ///
    /// Redefinitions may race, so an older version's file attribute is not
    /// trusted.
    pub fn source_file_for(&self, generation: u32) -> Option<Symbol> {
        let versions = self.versions.read();
        if versions.current.generation != generation {
            return None;
        }
        versions.current.source_file.clone()
    }

    /// True when `self` is `other` or one of its subclasses
    pub fn is_subclass_of(&self, other: &Klass) -> bool {
        let mut current: Option<&Klass> = Some(self);
        while let Some(klass) = current {
            if std::ptr::eq(klass, other) {
                return true;
            }
            current = klass.super_klass.as_deref();
        }
        false
    }

    /// The class object that pins this class while referenced
    pub fn mirror(self: &Arc<Self>) -> Mirror {
        Mirror(Arc::clone(self))
    }
}

impl fmt::Debug for Klass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Klass")
            .field("name", &self.name)
            .field("generation", &self.current_generation())
            .finish()
    }
}

fn ordinal_from_index(index: usize) -> u16 {
    assert!(index <= usize::from(u16::MAX), "too many methods in one class");
    index as u16
}

/// Language-level class object for a [`Klass`]
///
/// Holding a mirror keeps the class loaded.
#[derive(Clone)]
pub struct Mirror(Arc<Klass>);

impl Mirror {
    pub fn klass(&self) -> &Arc<Klass> {
        &self.0
    }
}

impl fmt::Debug for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mirror({})", self.0.external_name())
    }
}

/// Description of a class to load
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    pub name: String,
    pub super_klass: Option<Arc<Klass>>,
    pub loader_name: Option<String>,
    pub module: Option<(String, Option<String>)>,
    pub source_file: Option<String>,
    pub methods: Vec<MethodSpec>,
}

impl ClassDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_klass: None,
            loader_name: None,
            module: None,
            source_file: None,
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, super_klass: &Arc<Klass>) -> Self {
        self.super_klass = Some(Arc::clone(super_klass));
        self
    }

    pub fn loader(mut self, name: &str) -> Self {
        self.loader_name = Some(name.to_string());
        self
    }

    pub fn module(mut self, name: &str, version: Option<&str>) -> Self {
        self.module = Some((name.to_string(), version.map(str::to_string)));
        self
    }

    pub fn source_file(mut self, file: &str) -> Self {
        self.source_file = Some(file.to_string());
        self
    }

    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }
}

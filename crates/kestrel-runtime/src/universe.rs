//! Runtime-wide state
//!
//! The [`Universe`] owns the heap, the symbol and class tables, the bootstrap
//! throwable classes and the pool of out-of-memory errors whose backtrace
//! stores were allocated up front. Handing one of those out on the failure
//! path needs no allocation.

use crate::backtrace::{self, TraceError, TraceResult};
use crate::dictionary::{ClassRegistry, RegistryError};
use crate::exception::Throwable;
use crate::heap::Heap;
use crate::oops::{ClassDefinition, Klass, MethodSpec};
use crate::symbol::{SymbolTable, VmSymbols};
use crate::thread::ManagedThread;
use kestrel_config::{BacktraceConfig, RuntimeConfig};
use parking_lot::Mutex;
use std::sync::Arc;

pub const THROWABLE_CLASS: &str = "kestrel/lang/Throwable";
pub const ERROR_CLASS: &str = "kestrel/lang/Error";
pub const OUT_OF_MEMORY_ERROR_CLASS: &str = "kestrel/lang/OutOfMemoryError";

const BASE_MODULE: &str = "kestrel.base";

pub struct Universe {
    config: RuntimeConfig,
    heap: Heap,
    symbols: SymbolTable,
    vm_symbols: VmSymbols,
    classes: ClassRegistry,
    throwable_klass: Arc<Klass>,
    out_of_memory_klass: Arc<Klass>,
    preallocated_out_of_memory_errors: Mutex<Vec<Throwable>>,
}

impl Universe {
    /// Boot a runtime: bootstrap classes, then the preallocated error pool
    pub fn genesis(config: &RuntimeConfig) -> TraceResult<Self> {
        config
            .validate()
            .map_err(|err| TraceError::InvalidConfig(err.to_string()))?;
        let heap = Heap::from_config(&config.heap);
        let symbols = SymbolTable::new();
        let vm_symbols = VmSymbols::new(&symbols);
        let classes = ClassRegistry::new();

        let throwable_klass = bootstrap_class(
            &classes,
            &symbols,
            ClassDefinition::new(THROWABLE_CLASS)
                .source_file("Throwable.kst")
                .method(MethodSpec::new("<init>").line(0, 250))
                .method(MethodSpec::new("fillInStackTrace").line(0, 780))
                .method(MethodSpec::new("getStackTrace").line(0, 820)),
        );
        let error_klass = bootstrap_class(
            &classes,
            &symbols,
            ClassDefinition::new(ERROR_CLASS)
                .extends(&throwable_klass)
                .source_file("Error.kst")
                .method(MethodSpec::new("<init>").line(0, 40)),
        );
        let out_of_memory_klass = bootstrap_class(
            &classes,
            &symbols,
            ClassDefinition::new(OUT_OF_MEMORY_ERROR_CLASS)
                .extends(&error_klass)
                .source_file("OutOfMemoryError.kst")
                .method(MethodSpec::new("<init>").line(0, 30)),
        );

        let universe = Self {
            config: config.clone(),
            heap,
            symbols,
            vm_symbols,
            classes,
            throwable_klass,
            out_of_memory_klass,
            preallocated_out_of_memory_errors: Mutex::new(Vec::new()),
        };

        let mut pool = Vec::with_capacity(config.backtrace.preallocated_errors);
        if config.backtrace.enabled {
            for _ in 0..config.backtrace.preallocated_errors {
                let mut error = Throwable::preallocated(&universe.out_of_memory_klass);
                backtrace::allocate_backtrace(&universe, &mut error)?;
                pool.push(error);
            }
        }
        tracing::debug!(preallocated = pool.len(), "universe initialized");
        *universe.preallocated_out_of_memory_errors.lock() = pool;
        Ok(universe)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn backtrace_config(&self) -> &BacktraceConfig {
        &self.config.backtrace
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn vm_symbols(&self) -> &VmSymbols {
        &self.vm_symbols
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn throwable_klass(&self) -> &Arc<Klass> {
        &self.throwable_klass
    }

    pub fn out_of_memory_klass(&self) -> &Arc<Klass> {
        &self.out_of_memory_klass
    }

    pub fn define_class(&self, definition: &ClassDefinition) -> Result<Arc<Klass>, RegistryError> {
        self.classes.define(definition, &self.symbols)
    }

    /// Redefine a loaded class; returns its new generation
    pub fn redefine_class(
        &self,
        name: &str,
        methods: &[MethodSpec],
        source_file: Option<&str>,
    ) -> Result<u32, RegistryError> {
        self.classes.redefine(name, methods, source_file, &self.symbols)
    }

    /// Runtime-created throwables keep the store they were set up with
    pub fn should_fill_in_stack_trace(&self, throwable: &Throwable) -> bool {
        !throwable.is_preallocated()
    }

    pub fn preallocated_out_of_memory_errors_available(&self) -> usize {
        self.preallocated_out_of_memory_errors.lock().len()
    }

    /// An out-of-memory error carrying the current stack where possible
    ///
    /// Takes one error from the preallocated pool and refills its store in
    /// place. Once the pool is drained, the default error without a trace is
    /// returned.
    pub fn gen_out_of_memory_error(&self, thread: &ManagedThread, message: Option<&str>) -> Throwable {
        let pooled = if self.config.backtrace.enabled {
            self.preallocated_out_of_memory_errors.lock().pop()
        } else {
            None
        };

        let Some(mut error) = pooled else {
            let mut error = Throwable::preallocated(&self.out_of_memory_klass);
            error.set_message(message);
            return error;
        };

        error.set_message(message);
        if let Err(err) =
            backtrace::fill_in_stack_trace_of_preallocated_backtrace(self, &mut error, thread)
        {
            tracing::warn!(target: backtrace::LOG_TARGET, error = %err, "preallocated stack trace incomplete");
        }
        error
    }
}

fn bootstrap_class(
    classes: &ClassRegistry,
    symbols: &SymbolTable,
    definition: ClassDefinition,
) -> Arc<Klass> {
    let klass = Klass::define(&definition.module(BASE_MODULE, None), symbols);
    classes.insert(Arc::clone(&klass));
    klass
}

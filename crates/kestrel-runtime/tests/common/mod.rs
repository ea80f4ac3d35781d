//! Shared fixtures for backtrace tests
//!
//! `App` loads a small application into a fresh universe: an exception class
//! deriving from the bootstrap throwable, and a `Main` class whose methods
//! have line tables, a hidden helper and a native method.

#![allow(dead_code)]

use kestrel_config::RuntimeConfig;
use kestrel_runtime::oops::{ClassDefinition, Klass, Method, MethodSpec};
use kestrel_runtime::thread::ManagedThread;
use kestrel_runtime::universe::Universe;
use std::sync::Arc;

pub const APP_ERROR: &str = "app/AppError";
pub const MAIN: &str = "app/Main";
pub const WORKER: &str = "app/Worker";

pub struct App {
    pub universe: Universe,
    pub error: Arc<Klass>,
    pub main: Arc<Klass>,
    pub worker: Arc<Klass>,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::for_testing())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let universe = Universe::genesis(&config).unwrap();
        let error = universe
            .define_class(
                &ClassDefinition::new(APP_ERROR)
                    .extends(universe.throwable_klass())
                    .source_file("AppError.kst")
                    .method(MethodSpec::new("<init>").line(0, 12).code_size(8)),
            )
            .unwrap();
        let main = universe
            .define_class(
                &ClassDefinition::new(MAIN)
                    .loader("app")
                    .source_file("Main.kst")
                    .method(main_spec())
                    .method(run_spec())
                    .method(parse_spec())
                    .method(MethodSpec::new("helper").hidden().line(0, 40))
                    .method(MethodSpec::new("hash").native())
                    .method(MethodSpec::new("<init>").line(0, 2)),
            )
            .unwrap();
        let worker = universe
            .define_class(
                &ClassDefinition::new(WORKER)
                    .module("app.jobs", Some("1.4"))
                    .source_file("Worker.kst")
                    .method(MethodSpec::new("work").line(0, 50).line(2, 51).code_size(6)),
            )
            .unwrap();
        Self {
            universe,
            error,
            main,
            worker,
        }
    }

    pub fn method(&self, name: &str) -> Arc<Method> {
        self.main
            .find_method(name)
            .unwrap_or_else(|| panic!("app/Main has no method {name}"))
    }

    pub fn work(&self) -> Arc<Method> {
        self.worker.find_method("work").unwrap()
    }

    pub fn throwable_method(&self, name: &str) -> Arc<Method> {
        self.universe.throwable_klass().find_method(name).unwrap()
    }

    pub fn error_init(&self) -> Arc<Method> {
        self.error.find_method("<init>").unwrap()
    }

    /// `main -> run -> parse` with the exception being constructed on top
    pub fn throwing_thread(&self) -> ManagedThread {
        let mut thread = ManagedThread::new("main");
        thread
            .enter()
            .interpreted(&self.method("main"), 8)
            .interpreted(&self.method("run"), 6)
            .interpreted(&self.method("parse"), 3);
        self.push_exception_frames(&mut thread);
        thread
    }

    pub fn push_exception_frames(&self, thread: &mut ManagedThread) {
        thread
            .interpreted(&self.error_init(), 1)
            .interpreted(&self.throwable_method("<init>"), 4)
            .interpreted(&self.throwable_method("fillInStackTrace"), 0);
    }

    pub fn redefine_parse(&self) -> u32 {
        self.universe
            .redefine_class(
                MAIN,
                &[main_spec(), run_spec(), MethodSpec::new("parse").line(0, 90)],
                Some("Main.kst"),
            )
            .unwrap()
    }
}

fn main_spec() -> MethodSpec {
    MethodSpec::new("main")
        .static_method()
        .line(0, 5)
        .line(4, 6)
        .line(8, 7)
        .code_size(16)
}

fn run_spec() -> MethodSpec {
    MethodSpec::new("run").line(0, 20).line(6, 21).code_size(12)
}

fn parse_spec() -> MethodSpec {
    MethodSpec::new("parse").line(0, 30).line(3, 31).code_size(10)
}

/// `(method name, bci)` of every recorded frame
pub fn frames(throwable: &kestrel_runtime::Throwable) -> Vec<(String, i32)> {
    throwable
        .backtrace()
        .map(|backtrace| {
            backtrace
                .iter()
                .map(|frame| (frame.name.to_string(), frame.bci))
                .collect()
        })
        .unwrap_or_default()
}

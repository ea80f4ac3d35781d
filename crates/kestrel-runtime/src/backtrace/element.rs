//! Display-ready frame records

use super::iterator::BacktraceElement;
use super::location::{self, version_matches};
use crate::oops::{Klass, Method, UNKNOWN_LINE};
use crate::symbol::Symbol;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Line number reported for native methods
pub const NATIVE_LINE: i32 = -2;

/// Whether the recorded code could still be resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    #[default]
    Live,
    /// The method's class version has been replaced or dropped
    Redefined,
}

/// One materialized stack frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackTraceElement {
    pub declaring_class: Symbol,
    pub class_loader_name: Option<Symbol>,
    pub module_name: Option<Symbol>,
    pub module_version: Option<Symbol>,
    pub method_name: Symbol,
    pub file_name: Option<Symbol>,
    pub line_number: i32,
    pub status: FrameStatus,
}

impl Default for StackTraceElement {
    fn default() -> Self {
        Self {
            declaring_class: Symbol::new(""),
            class_loader_name: None,
            module_name: None,
            module_version: None,
            method_name: Symbol::new(""),
            file_name: None,
            line_number: UNKNOWN_LINE,
            status: FrameStatus::Live,
        }
    }
}

/// Line number for a frame: [`NATIVE_LINE`] for natives, else from the line table
pub fn line_number(method: &Method, bci: i32) -> i32 {
    if method.is_native() {
        NATIVE_LINE
    } else {
        method.line_number_from_bci(bci)
    }
}

impl StackTraceElement {
    /// Element for a live method at `bci`; `None` once its class is gone
    pub fn create(method: &Method, bci: i32) -> Option<Self> {
        let holder = method.holder()?;
        let mut element = Self::default();
        element.fill_in(
            &holder,
            method.ordinal(),
            location::version_of(method.generation()),
            bci,
            method.name(),
        );
        Some(element)
    }

    /// Element for a stored backtrace frame
    pub fn from_backtrace(frame: &BacktraceElement) -> Self {
        let mut element = Self::default();
        element.fill_in_from(frame);
        element
    }

    pub(crate) fn fill_in_from(&mut self, frame: &BacktraceElement) {
        self.fill_in(
            frame.mirror.klass(),
            frame.method_id,
            frame.version,
            frame.bci,
            &frame.name,
        );
    }

    /// Materialize a frame recorded as `(holder, method_id, version, bci, name)`
    ///
    /// A frame whose method no longer resolves at `version` keeps the stored
    /// name and loses its file and line.
    pub fn fill_in(
        &mut self,
        holder: &Arc<Klass>,
        method_id: u16,
        version: u16,
        bci: i32,
        name: &Symbol,
    ) {
        self.declaring_class = holder.external_name().clone();
        self.class_loader_name = holder.loader_name().cloned();
        self.module_name = holder.module().map(|module| module.name.clone());
        self.module_version = holder.module().and_then(|module| module.version.clone());

        let method = holder.method_with_ordinal(method_id, u32::from(version));
        match method {
            Some(method) if version_matches(Some(method.as_ref()), version) => {
                self.method_name = method.name().clone();
                self.line_number = line_number(&method, bci);
                self.file_name = holder.source_file_for(u32::from(version));
                self.status = FrameStatus::Live;
            }
            _ => {
                self.method_name = name.clone();
                self.line_number = UNKNOWN_LINE;
                self.file_name = None;
                self.status = FrameStatus::Redefined;
            }
        }
    }

    pub fn is_native_method(&self) -> bool {
        self.status == FrameStatus::Live && self.line_number == NATIVE_LINE
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `Class.method(module@version/File:line)`
impl fmt::Display for StackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.declaring_class, self.method_name)?;

        if let Some(module) = &self.module_name {
            match &self.module_version {
                Some(version) => write!(f, "{}@{}/", module, version)?,
                None => write!(f, "{}/", module)?,
            }
        }

        if self.status == FrameStatus::Redefined {
            return f.write_str("Redefined)");
        }
        if self.line_number == NATIVE_LINE {
            return f.write_str("Native Method)");
        }
        match &self.file_name {
            Some(file) if self.line_number != UNKNOWN_LINE => {
                write!(f, "{}:{})", file, self.line_number)
            }
            Some(file) => write!(f, "{})", file),
            None => f.write_str("Unknown Source)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oops::{ClassDefinition, MethodSpec};
    use crate::symbol::SymbolTable;
    use pretty_assertions::assert_eq;

    fn klass(symbols: &SymbolTable) -> Arc<Klass> {
        Klass::define(
            &ClassDefinition::new("com/acme/Widget")
                .module("acme.core", Some("2.1"))
                .loader("app")
                .source_file("Widget.kt")
                .method(MethodSpec::new("render").line(0, 40).line(6, 42).code_size(12))
                .method(MethodSpec::new("hash").native())
                .method(MethodSpec::new("plain").code_size(4)),
            symbols,
        )
    }

    #[test]
    fn test_create_live_element() {
        let symbols = SymbolTable::new();
        let klass = klass(&symbols);
        let element = StackTraceElement::create(&klass.find_method("render").unwrap(), 7).unwrap();

        assert_eq!(element.declaring_class.as_str(), "com.acme.Widget");
        assert_eq!(element.class_loader_name.as_deref(), Some("app"));
        assert_eq!(element.line_number, 42);
        assert_eq!(element.status, FrameStatus::Live);
        assert_eq!(
            element.to_string(),
            "com.acme.Widget.render(acme.core@2.1/Widget.kt:42)"
        );
    }

    #[test]
    fn test_native_and_lineless() {
        let symbols = SymbolTable::new();
        let klass = klass(&symbols);
        let hash = StackTraceElement::create(&klass.find_method("hash").unwrap(), 0).unwrap();
        assert!(hash.is_native_method());
        assert_eq!(hash.to_string(), "com.acme.Widget.hash(acme.core@2.1/Native Method)");

        let plain = StackTraceElement::create(&klass.find_method("plain").unwrap(), 1).unwrap();
        assert_eq!(plain.to_string(), "com.acme.Widget.plain(acme.core@2.1/Widget.kt)");
    }

    #[test]
    fn test_stale_frame_uses_stored_name() {
        let symbols = SymbolTable::new();
        let klass = klass(&symbols);
        let render = klass.find_method("render").unwrap();
        klass.redefine(&[MethodSpec::new("render")], Some("Widget.kt"), &symbols);
        klass.purge_previous_versions();

        let mut element = StackTraceElement::default();
        element.fill_in(&klass, render.ordinal(), 0, 6, render.name());
        assert_eq!(element.status, FrameStatus::Redefined);
        assert_eq!(element.file_name, None);
        assert_eq!(element.to_string(), "com.acme.Widget.render(acme.core@2.1/Redefined)");
    }

    #[test]
    fn test_retained_version_loses_source_file() {
        let symbols = SymbolTable::new();
        let klass = klass(&symbols);
        let render = klass.find_method("render").unwrap();
        klass.redefine(&[MethodSpec::new("render")], Some("Widget.kt"), &symbols);

        let mut element = StackTraceElement::default();
        element.fill_in(&klass, render.ordinal(), 0, 6, render.name());
        assert_eq!(element.status, FrameStatus::Live);
        assert_eq!(element.line_number, 42);
        assert_eq!(element.to_string(), "com.acme.Widget.render(acme.core@2.1/Unknown Source)");
    }

    #[test]
    fn test_unnamed_module_omitted() {
        let symbols = SymbolTable::new();
        let klass = Klass::define(
            &ClassDefinition::new("Main").method(MethodSpec::new("main").line(0, 3)),
            &symbols,
        );
        let element = StackTraceElement::create(&klass.find_method("main").unwrap(), 0).unwrap();
        assert_eq!(element.to_string(), "Main.main(Unknown Source)");
    }
}

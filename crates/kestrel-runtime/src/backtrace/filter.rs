//! Which walked frames make it into a backtrace
//!
//! The leading frames of a fresh capture are the exception machinery itself:
//! first `fillInStackTrace`, then the constructor chain. Each check is a latch
//! that stays off once a frame fails it, so the same methods deeper in the
//! stack are kept.

use crate::oops::{Klass, Method};
use crate::symbol::VmSymbols;

/// Outcome for one walked frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Record,
    SkipFillInStackTrace,
    SkipConstructor,
    SkipHidden,
}

pub struct FrameFilter<'a> {
    throwable_klass: &'a Klass,
    symbols: &'a VmSymbols,
    show_hidden_frames: bool,
    skip_fill_in_stack_trace: bool,
    skip_constructors: bool,
}

impl<'a> FrameFilter<'a> {
    pub fn new(throwable_klass: &'a Klass, symbols: &'a VmSymbols, show_hidden_frames: bool) -> Self {
        Self {
            throwable_klass,
            symbols,
            show_hidden_frames,
            skip_fill_in_stack_trace: true,
            skip_constructors: true,
        }
    }

    /// Method belongs to the throwable's class or one of its superclasses
    fn in_throwable_hierarchy(&self, method: &Method) -> bool {
        method
            .holder()
            .is_some_and(|holder| self.throwable_klass.is_subclass_of(&holder))
    }

    pub fn decide(&mut self, method: &Method) -> FilterDecision {
        if self.skip_fill_in_stack_trace {
            if *method.name() == self.symbols.fill_in_stack_trace
                && self.in_throwable_hierarchy(method)
            {
                return FilterDecision::SkipFillInStackTrace;
            }
            self.skip_fill_in_stack_trace = false;
        }

        if self.skip_constructors {
            if *method.name() == self.symbols.object_initializer
                && self.in_throwable_hierarchy(method)
            {
                return FilterDecision::SkipConstructor;
            }
            self.skip_constructors = false;
        }

        if method.is_hidden() && !self.show_hidden_frames {
            return FilterDecision::SkipHidden;
        }
        FilterDecision::Record
    }
}

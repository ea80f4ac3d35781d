//! Managed threads and their native call stacks
//!
//! Frames are stored bottom to top. The bottom-most frame of a thread that
//! runs managed code is always the [`Frame::Entry`] through which it first
//! entered; further entry frames appear wherever native code called back into
//! managed code.

use crate::code::CompiledMethod;
use crate::oops::Method;
use crate::symbol::Symbol;
use std::sync::Arc;

/// One physical activation on a thread's stack
#[derive(Debug, Clone)]
pub enum Frame {
    /// Transition from native code into managed code
    Entry,
    /// Interpreted activation
    Interpreted { method: Arc<Method>, bci: i32 },
    /// Compiled activation, possibly covering several inlined methods
    Compiled {
        code: Arc<CompiledMethod>,
        pc_offset: u32,
    },
    /// Runtime-internal stub
    Stub { name: Symbol },
}

impl Frame {
    pub fn is_managed(&self) -> bool {
        matches!(self, Frame::Interpreted { .. } | Frame::Compiled { .. })
    }
}

/// A thread as seen by the stack walker
#[derive(Debug, Default)]
pub struct ManagedThread {
    name: String,
    frames: Vec<Frame>,
}

impl ManagedThread {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            frames: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames from the bottom of the stack to the top
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True when at least one managed activation is on the stack
    pub fn has_last_managed_frame(&self) -> bool {
        self.frames.iter().any(Frame::is_managed)
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Call from native code into managed code
    pub fn enter(&mut self) -> &mut Self {
        self.push(Frame::Entry);
        self
    }

    pub fn interpreted(&mut self, method: &Arc<Method>, bci: i32) -> &mut Self {
        self.push(Frame::Interpreted {
            method: Arc::clone(method),
            bci,
        });
        self
    }

    pub fn compiled(&mut self, code: &Arc<CompiledMethod>, pc_offset: u32) -> &mut Self {
        self.push(Frame::Compiled {
            code: Arc::clone(code),
            pc_offset,
        });
        self
    }

    pub fn stub(&mut self, name: &str) -> &mut Self {
        self.push(Frame::Stub {
            name: Symbol::new(name),
        });
        self
    }
}

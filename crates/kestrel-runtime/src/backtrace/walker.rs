//! Stack walking
//!
//! [`StackWalker`] visits a thread's frames from the top and reduces each to
//! `(method, bci)` pairs. A compiled frame expands into its inlined scopes,
//! most-inlined first. Stubs and nested entry frames are stepped over; the
//! bottom entry frame ends the walk.

use crate::code::{CompiledMethod, DebugInfoError};
use crate::oops::{Klass, Method};
use crate::thread::Frame;
use std::sync::Arc;

/// How a walked frame was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Interpreted,
    /// Outermost method of a compiled frame
    CompiledPhysical,
    /// Method inlined into a compiled frame
    CompiledInlined,
    /// Compiled wrapper around a native method
    NativeEntry,
}

/// One logical frame produced by the walker
#[derive(Debug, Clone)]
pub struct WalkedFrame {
    pub method: Arc<Method>,
    pub holder: Arc<Klass>,
    pub bci: i32,
    pub kind: FrameKind,
}

pub struct StackWalker<'a> {
    frames: &'a [Frame],
    /// Frames below this index are still to be visited
    remaining: usize,
    /// Scope chain of the compiled frame being expanded
    pending: Option<(&'a CompiledMethod, u32)>,
    done: bool,
}

impl<'a> StackWalker<'a> {
    /// Walk `frames`, given bottom to top
    pub fn new(frames: &'a [Frame]) -> Self {
        Self {
            frames,
            remaining: frames.len(),
            pending: None,
            done: false,
        }
    }

    fn walked(method: &Arc<Method>, bci: i32, kind: FrameKind) -> Option<WalkedFrame> {
        match method.holder() {
            Some(holder) => Some(WalkedFrame {
                method: Arc::clone(method),
                holder,
                bci,
                kind,
            }),
            None => {
                tracing::trace!(method = %method.name(), "frame of an unloaded class skipped");
                None
            }
        }
    }

    fn next_scope(
        &mut self,
        code: &'a CompiledMethod,
        offset: u32,
    ) -> Result<Option<WalkedFrame>, DebugInfoError> {
        let scope = code.scope_at(offset)?;
        let kind = if scope.is_top() {
            FrameKind::CompiledPhysical
        } else {
            self.pending = Some((code, scope.sender_offset));
            FrameKind::CompiledInlined
        };
        Ok(Self::walked(&scope.method, scope.bci, kind))
    }

    fn step(&mut self) -> Result<Option<WalkedFrame>, DebugInfoError> {
        loop {
            if let Some((code, offset)) = self.pending.take() {
                match self.next_scope(code, offset)? {
                    Some(frame) => return Ok(Some(frame)),
                    None => continue,
                }
            }

            if self.done || self.remaining == 0 {
                self.done = true;
                return Ok(None);
            }
            self.remaining -= 1;
            let index = self.remaining;
            let frames = self.frames;

            match &frames[index] {
                Frame::Entry if index == 0 => {
                    self.done = true;
                    return Ok(None);
                }
                Frame::Entry => {
                    tracing::trace!(index, "nested entry frame skipped");
                }
                Frame::Stub { name } => {
                    tracing::trace!(index, stub = %name, "stub frame skipped");
                }
                Frame::Interpreted { method, bci } => {
                    if let Some(frame) = Self::walked(method, *bci, FrameKind::Interpreted) {
                        return Ok(Some(frame));
                    }
                }
                Frame::Compiled { code, pc_offset } => {
                    if code.is_native_wrapper() {
                        if let Some(frame) = Self::walked(code.method(), 0, FrameKind::NativeEntry)
                        {
                            return Ok(Some(frame));
                        }
                        continue;
                    }
                    let desc = code
                        .pc_desc_at(*pc_offset)
                        .ok_or(DebugInfoError::MissingPcDesc {
                            pc_offset: *pc_offset,
                        })?;
                    self.pending = Some((code.as_ref(), desc.scope_decode_offset));
                }
            }
        }
    }
}

impl Iterator for StackWalker<'_> {
    type Item = Result<WalkedFrame, DebugInfoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending.is_none() {
            return None;
        }
        match self.step() {
            Ok(frame) => frame.map(Ok),
            Err(err) => {
                self.done = true;
                self.pending = None;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oops::{ClassDefinition, MethodSpec};
    use crate::symbol::SymbolTable;
    use crate::thread::ManagedThread;

    fn service() -> Arc<Klass> {
        Klass::define(
            &ClassDefinition::new("app/Service")
                .method(MethodSpec::new("main").code_size(64))
                .method(MethodSpec::new("handle").code_size(64))
                .method(MethodSpec::new("parse").code_size(64))
                .method(MethodSpec::new("hash").native()),
            &SymbolTable::new(),
        )
    }

    fn walk(thread: &ManagedThread) -> Vec<(String, i32, FrameKind)> {
        StackWalker::new(thread.frames())
            .map(|frame| {
                let frame = frame.unwrap();
                (frame.method.name().to_string(), frame.bci, frame.kind)
            })
            .collect()
    }

    #[test]
    fn test_interpreted_frames_top_first() {
        let klass = service();
        let mut thread = ManagedThread::new("main");
        thread
            .enter()
            .interpreted(&klass.find_method("main").unwrap(), 3)
            .interpreted(&klass.find_method("handle").unwrap(), 8);

        assert_eq!(
            walk(&thread),
            vec![
                ("handle".to_string(), 8, FrameKind::Interpreted),
                ("main".to_string(), 3, FrameKind::Interpreted),
            ]
        );
    }

    #[test]
    fn test_compiled_frame_expands_inlined_scopes() {
        let klass = service();
        let main = klass.find_method("main").unwrap();
        let handle = klass.find_method("handle").unwrap();
        let parse = klass.find_method("parse").unwrap();
        let code = CompiledMethod::builder(Arc::clone(&handle))
            .call_site(24, &[(Arc::clone(&handle), 5), (Arc::clone(&parse), 11)])
            .build();

        let mut thread = ManagedThread::new("main");
        thread.enter().interpreted(&main, 1).compiled(&code, 24);

        assert_eq!(
            walk(&thread),
            vec![
                ("parse".to_string(), 11, FrameKind::CompiledInlined),
                ("handle".to_string(), 5, FrameKind::CompiledPhysical),
                ("main".to_string(), 1, FrameKind::Interpreted),
            ]
        );
    }

    #[test]
    fn test_native_wrapper_and_stubs() {
        let klass = service();
        let hash = CompiledMethod::native_wrapper(klass.find_method("hash").unwrap());
        let mut thread = ManagedThread::new("main");
        thread
            .enter()
            .interpreted(&klass.find_method("main").unwrap(), 2)
            .stub("call_stub")
            .compiled(&hash, 0);

        assert_eq!(
            walk(&thread),
            vec![
                ("hash".to_string(), 0, FrameKind::NativeEntry),
                ("main".to_string(), 2, FrameKind::Interpreted),
            ]
        );
    }

    #[test]
    fn test_nested_entry_skipped_bottom_entry_stops() {
        let klass = service();
        let main = klass.find_method("main").unwrap();
        let handle = klass.find_method("handle").unwrap();
        let mut thread = ManagedThread::new("main");
        thread
            .enter()
            .interpreted(&main, 4)
            .stub("native_call")
            .enter()
            .interpreted(&handle, 6);

        assert_eq!(
            walk(&thread),
            vec![
                ("handle".to_string(), 6, FrameKind::Interpreted),
                ("main".to_string(), 4, FrameKind::Interpreted),
            ]
        );
    }

    #[test]
    fn test_missing_pc_desc_is_an_error() {
        let klass = service();
        let handle = klass.find_method("handle").unwrap();
        let code = CompiledMethod::builder(Arc::clone(&handle))
            .call_site(8, &[])
            .build();
        let mut thread = ManagedThread::new("main");
        thread.enter().compiled(&code, 9);

        let mut walker = StackWalker::new(thread.frames());
        assert_eq!(
            walker.next().unwrap().unwrap_err(),
            DebugInfoError::MissingPcDesc { pc_offset: 9 }
        );
        assert!(walker.next().is_none());
    }
}

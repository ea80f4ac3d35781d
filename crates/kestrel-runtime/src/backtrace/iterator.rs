//! Replay of a stored backtrace

use super::chunk::{Backtrace, ChunkId};
use super::location::{self, version_matches};
use crate::oops::{Method, Mirror};
use crate::symbol::Symbol;
use std::sync::Arc;

/// One stored frame, as recorded at capture time
#[derive(Debug, Clone)]
pub struct BacktraceElement {
    pub mirror: Mirror,
    pub method_id: u16,
    pub version: u16,
    pub bci: i32,
    pub name: Symbol,
}

impl BacktraceElement {
    /// The method recorded for this frame, if its class version is still around
    pub fn resolve(&self) -> Option<Arc<Method>> {
        self.mirror
            .klass()
            .method_with_ordinal(self.method_id, u32::from(self.version))
    }

    /// The recorded method, only when it still matches the stored version
    pub fn live_method(&self) -> Option<Arc<Method>> {
        self.resolve()
            .filter(|method| version_matches(Some(method.as_ref()), self.version))
    }
}

/// Cursor over a [`Backtrace`] in capture order (innermost frame first)
#[derive(Debug, Clone)]
pub struct BacktraceIterator<'a> {
    backtrace: &'a Backtrace,
    chunk: Option<ChunkId>,
    index: usize,
}

impl<'a> BacktraceIterator<'a> {
    pub fn new(backtrace: &'a Backtrace) -> Self {
        Self {
            backtrace,
            chunk: Some(ChunkId::HEAD),
            index: 0,
        }
    }

    /// True while the cursor sits on a recorded frame
    pub fn has_more(&self) -> bool {
        match self.chunk {
            Some(id) => self.backtrace.chunk(id).mirror(self.index).is_some(),
            None => false,
        }
    }
}

impl Iterator for BacktraceIterator<'_> {
    type Item = BacktraceElement;

    fn next(&mut self) -> Option<BacktraceElement> {
        if !self.has_more() {
            return None;
        }
        let id = self.chunk?;
        let chunk = self.backtrace.chunk(id);

        let location = chunk.location(self.index);
        let element = BacktraceElement {
            mirror: chunk.mirror(self.index)?.clone(),
            method_id: chunk.method_id(self.index),
            version: location::version_at(location),
            bci: location::bci_at(location),
            name: chunk.name(self.index)?.clone(),
        };

        self.index += 1;
        if self.index >= chunk.capacity() {
            self.chunk = chunk.next();
            self.index = 0;
        }
        Some(element)
    }
}

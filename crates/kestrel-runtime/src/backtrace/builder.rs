//! Incremental construction of a [`Backtrace`]
//!
//! The builder keeps a no-safepoint scope open for its whole life. Chunk and
//! marker allocation are the only places a collection may happen; they run in
//! a paused scope, and every input of the frame being written is held by a
//! counted reference across the pause.

use super::chunk::{Backtrace, ChunkId, FrameChunk};
use super::location;
use super::{TraceError, TraceResult};
use crate::heap::Heap;
use crate::oops::{Klass, Method};
use crate::safepoint::NoSafepointVerifier;
use std::sync::Arc;

pub struct BacktraceBuilder {
    heap: Heap,
    backtrace: Backtrace,
    current: ChunkId,
    index: usize,
    depth: usize,
    reuse: bool,
    nsv: NoSafepointVerifier,
}

impl BacktraceBuilder {
    /// Start a new store with one empty chunk
    pub fn new(heap: &Heap, chunk_size: usize) -> TraceResult<Self> {
        let mut nsv = NoSafepointVerifier::new();
        let backtrace = {
            let _pause = nsv.pause();
            Backtrace::allocate(heap, chunk_size)?
        };
        Ok(Self {
            heap: heap.clone(),
            backtrace,
            current: ChunkId::HEAD,
            index: 0,
            depth: 0,
            reuse: false,
            nsv,
        })
    }

    /// Refill an existing store in place
    ///
    /// Chunks already in the store are overwritten rather than reallocated.
    pub fn over(heap: &Heap, mut backtrace: Backtrace) -> Self {
        backtrace.clear_hidden_top_frame();
        Self {
            heap: heap.clone(),
            backtrace,
            current: ChunkId::HEAD,
            index: 0,
            depth: 0,
            reuse: true,
            nsv: NoSafepointVerifier::new(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.backtrace.chunk_size()
    }

    /// Frames pushed so far
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Move the cursor to a fresh chunk linked after the current one
    pub fn expand(&mut self) -> TraceResult<()> {
        let following = self.current.index() + 1;
        let next = if self.reuse && following < self.backtrace.allocated_chunks() {
            ChunkId::from_index(following)
        } else {
            let chunk = {
                let _pause = self.nsv.pause();
                FrameChunk::allocate(&self.heap, self.backtrace.chunk_size())?
            };
            self.backtrace.push_chunk(chunk)
        };

        self.backtrace.chunk_mut(self.current).set_next(Some(next));
        self.current = next;
        self.index = 0;
        tracing::debug!(chunk = next.index(), reuse = self.reuse, "backtrace chunk added");
        Ok(())
    }

    /// Record one frame at the cursor
    pub fn push(&mut self, method: &Method, holder: &Arc<Klass>, bci: i32) -> TraceResult<()> {
        if !location::bci_fits(bci) {
            return Err(TraceError::BciOutOfRange {
                method: method.external_name(),
                bci,
            });
        }
        if self.index >= self.backtrace.chunk_size() {
            self.expand()?;
        }

        let location = location::encode(bci, method.generation());
        self.backtrace.chunk_mut(self.current).write(
            self.index,
            method.ordinal(),
            location,
            holder.mirror(),
            method.name().clone(),
        );
        self.index += 1;
        self.depth += 1;
        Ok(())
    }

    /// Mark that the first walked frame was hidden; idempotent
    pub fn set_has_hidden_top_frame(&mut self) -> TraceResult<()> {
        if self.backtrace.has_hidden_top_frame() {
            return Ok(());
        }
        let marker = {
            let _pause = self.nsv.pause();
            self.heap.box_boolean(true)?
        };
        self.backtrace.set_hidden_top_frame(marker);
        Ok(())
    }

    /// Complete the store
    ///
    /// A refilled store drops whatever the previous fill left past the cursor.
    pub fn finish(mut self) -> Backtrace {
        if self.reuse {
            let chunk = self.backtrace.chunk_mut(self.current);
            chunk.clear_from(self.index);
            chunk.set_next(None);
        }
        self.backtrace.verify();
        self.backtrace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrace::location::MAX_BCI;
    use crate::oops::{ClassDefinition, MethodSpec};
    use crate::safepoint;
    use crate::symbol::SymbolTable;

    fn klass() -> Arc<Klass> {
        Klass::define(
            &ClassDefinition::new("app/Worker")
                .method(MethodSpec::new("a").code_size(100))
                .method(MethodSpec::new("b").code_size(100)),
            &SymbolTable::new(),
        )
    }

    #[test]
    fn test_push_expands_at_capacity() {
        let heap = Heap::unbounded();
        let klass = klass();
        let a = klass.find_method("a").unwrap();

        let mut builder = BacktraceBuilder::new(&heap, 2).unwrap();
        for bci in 0..5 {
            builder.push(&a, &klass, bci).unwrap();
        }
        let backtrace = builder.finish();
        assert_eq!(backtrace.chunk_count(), 3);
        assert_eq!(backtrace.frame_count(), 5);
    }

    #[test]
    fn test_builder_holds_no_safepoint_scope() {
        let heap = Heap::unbounded();
        let builder = BacktraceBuilder::new(&heap, 2).unwrap();
        assert!(!safepoint::safepoint_allowed());
        drop(builder);
        assert!(safepoint::safepoint_allowed());
    }

    #[test]
    fn test_hidden_marker_allocated_once() {
        let heap = Heap::unbounded();
        let mut builder = BacktraceBuilder::new(&heap, 2).unwrap();
        builder.set_has_hidden_top_frame().unwrap();
        let used = heap.used();
        builder.set_has_hidden_top_frame().unwrap();
        assert_eq!(heap.used(), used);
        assert!(builder.finish().has_hidden_top_frame());
    }

    #[test]
    fn test_expand_failure_reports_oom() {
        let heap = Heap::with_limit(crate::backtrace::chunk::chunk_payload_bytes(1) + 16);
        let klass = klass();
        let a = klass.find_method("a").unwrap();

        let mut builder = BacktraceBuilder::new(&heap, 1).unwrap();
        builder.push(&a, &klass, 0).unwrap();
        assert!(matches!(
            builder.push(&a, &klass, 1),
            Err(crate::backtrace::TraceError::OutOfMemory(_))
        ));
    }

    #[test]
    fn test_push_rejects_bci_past_location_range() {
        let heap = Heap::unbounded();
        let klass = klass();
        let a = klass.find_method("a").unwrap();

        let mut builder = BacktraceBuilder::new(&heap, 2).unwrap();
        builder.push(&a, &klass, MAX_BCI).unwrap();
        assert_eq!(
            builder.push(&a, &klass, 69_999),
            Err(TraceError::BciOutOfRange {
                method: "app.Worker.a".to_string(),
                bci: 69_999
            })
        );
        assert_eq!(builder.depth(), 1);
        let frames: Vec<_> = builder.finish().iter().map(|e| e.bci).collect();
        assert_eq!(frames, vec![MAX_BCI]);
    }

    #[test]
    fn test_reuse_overwrites_and_truncates() {
        let heap = Heap::unbounded();
        let klass = klass();
        let a = klass.find_method("a").unwrap();
        let b = klass.find_method("b").unwrap();

        let mut builder = BacktraceBuilder::new(&heap, 2).unwrap();
        for bci in 0..4 {
            builder.push(&a, &klass, bci).unwrap();
        }
        builder.set_has_hidden_top_frame().unwrap();
        let backtrace = builder.finish();
        let allocations = heap.allocation_count();

        let mut builder = BacktraceBuilder::over(&heap, backtrace);
        builder.push(&b, &klass, 9).unwrap();
        let backtrace = builder.finish();

        assert_eq!(heap.allocation_count(), allocations);
        assert!(!backtrace.has_hidden_top_frame());
        let frames: Vec<_> = backtrace.iter().map(|e| (e.name.to_string(), e.bci)).collect();
        assert_eq!(frames, vec![("b".to_string(), 9)]);
        assert_eq!(backtrace.chunk_count(), 1);
        assert_eq!(backtrace.allocated_chunks(), 2);
    }
}

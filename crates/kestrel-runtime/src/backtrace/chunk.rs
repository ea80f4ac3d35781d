//! Chunked frame store
//!
//! A [`Backtrace`] is an arena of fixed-capacity [`FrameChunk`]s linked in
//! capture order. Each chunk holds four parallel columns; slot `i` of every
//! column describes one frame. An empty mirror slot marks the logical end of
//! the trace, which lets a reused store hold fewer frames than its capacity.

use super::iterator::BacktraceIterator;
use crate::heap::{BoxedBool, Heap, HeapError, HeapReservation};
use crate::oops::Mirror;
use crate::symbol::Symbol;
use std::fmt;
use std::mem::size_of;

/// Index of a chunk within its backtrace's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(u32);

impl ChunkId {
    pub const HEAD: ChunkId = ChunkId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        ChunkId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bytes charged to the heap for one chunk of `capacity` frames
pub fn chunk_payload_bytes(capacity: usize) -> usize {
    let per_frame = size_of::<u16>()
        + size_of::<u32>()
        + size_of::<Option<Mirror>>()
        + size_of::<Option<Symbol>>();
    capacity * per_frame + size_of::<Option<ChunkId>>() + size_of::<usize>()
}

/// One block of captured frames
pub struct FrameChunk {
    methods: Box<[u16]>,
    locations: Box<[u32]>,
    mirrors: Box<[Option<Mirror>]>,
    names: Box<[Option<Symbol>]>,
    next: Option<ChunkId>,
    hidden_top_frame: Option<BoxedBool>,
    _reservation: HeapReservation,
}

impl FrameChunk {
    pub(crate) fn allocate(heap: &Heap, capacity: usize) -> Result<Self, HeapError> {
        let reservation = heap.allocate(chunk_payload_bytes(capacity))?;
        Ok(Self {
            methods: vec![0; capacity].into_boxed_slice(),
            locations: vec![0; capacity].into_boxed_slice(),
            mirrors: vec![None; capacity].into_boxed_slice(),
            names: vec![None; capacity].into_boxed_slice(),
            next: None,
            hidden_top_frame: None,
            _reservation: reservation,
        })
    }

    pub fn capacity(&self) -> usize {
        self.methods.len()
    }

    pub fn next(&self) -> Option<ChunkId> {
        self.next
    }

    pub fn method_id(&self, index: usize) -> u16 {
        self.methods[index]
    }

    pub fn location(&self, index: usize) -> u32 {
        self.locations[index]
    }

    pub fn mirror(&self, index: usize) -> Option<&Mirror> {
        self.mirrors.get(index).and_then(Option::as_ref)
    }

    pub fn name(&self, index: usize) -> Option<&Symbol> {
        self.names.get(index).and_then(Option::as_ref)
    }

    /// Number of occupied slots from the front of the chunk
    pub fn occupied(&self) -> usize {
        self.mirrors.iter().take_while(|m| m.is_some()).count()
    }

    pub(crate) fn write(
        &mut self,
        index: usize,
        method_id: u16,
        location: u32,
        mirror: Mirror,
        name: Symbol,
    ) {
        self.methods[index] = method_id;
        self.locations[index] = location;
        self.mirrors[index] = Some(mirror);
        self.names[index] = Some(name);
    }

    /// Drop slots `from..` so they read as absent
    pub(crate) fn clear_from(&mut self, from: usize) {
        for index in from..self.capacity() {
            self.methods[index] = 0;
            self.locations[index] = 0;
            self.mirrors[index] = None;
            self.names[index] = None;
        }
    }

    pub(crate) fn set_next(&mut self, next: Option<ChunkId>) {
        self.next = next;
    }

    pub(crate) fn verify(&self) {
        let capacity = self.methods.len();
        assert!(
            self.locations.len() == capacity
                && self.mirrors.len() == capacity
                && self.names.len() == capacity,
            "frame chunk columns out of step"
        );
    }
}

impl fmt::Debug for FrameChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameChunk")
            .field("capacity", &self.capacity())
            .field("occupied", &self.occupied())
            .field("next", &self.next)
            .field("hidden_top_frame", &self.hidden_top_frame.is_some())
            .finish()
    }
}

/// A captured stack trace
#[derive(Debug)]
pub struct Backtrace {
    chunks: Vec<FrameChunk>,
    chunk_size: usize,
}

impl Backtrace {
    /// A store with just its head chunk
    pub(crate) fn allocate(heap: &Heap, chunk_size: usize) -> Result<Self, HeapError> {
        assert!(chunk_size > 0, "backtrace chunks need room for a frame");
        let head = FrameChunk::allocate(heap, chunk_size)?;
        Ok(Self {
            chunks: vec![head],
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn head(&self) -> &FrameChunk {
        &self.chunks[ChunkId::HEAD.index()]
    }

    pub fn chunk(&self, id: ChunkId) -> &FrameChunk {
        &self.chunks[id.index()]
    }

    pub(crate) fn chunk_mut(&mut self, id: ChunkId) -> &mut FrameChunk {
        &mut self.chunks[id.index()]
    }

    /// Append a fresh chunk to the arena (not yet linked)
    pub(crate) fn push_chunk(&mut self, chunk: FrameChunk) -> ChunkId {
        debug_assert_eq!(chunk.capacity(), self.chunk_size);
        let id = ChunkId(self.chunks.len() as u32);
        self.chunks.push(chunk);
        id
    }

    /// Chunks present in the arena, linked or not
    pub fn allocated_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks reachable from the head
    pub fn chunk_count(&self) -> usize {
        let mut count = 0;
        let mut current = Some(ChunkId::HEAD);
        while let Some(id) = current {
            count += 1;
            current = self.chunk(id).next();
        }
        count
    }

    /// True when the first walked frame was suppressed as hidden
    pub fn has_hidden_top_frame(&self) -> bool {
        self.head()
            .hidden_top_frame
            .as_ref()
            .is_some_and(BoxedBool::value)
    }

    pub(crate) fn set_hidden_top_frame(&mut self, marker: BoxedBool) {
        self.chunk_mut(ChunkId::HEAD).hidden_top_frame = Some(marker);
    }

    pub(crate) fn clear_hidden_top_frame(&mut self) {
        self.chunk_mut(ChunkId::HEAD).hidden_top_frame = None;
    }

    pub fn iter(&self) -> BacktraceIterator<'_> {
        BacktraceIterator::new(self)
    }

    /// Number of frames, counted by walking the store
    pub fn frame_count(&self) -> usize {
        self.iter().count()
    }

    pub(crate) fn verify(&self) {
        for chunk in &self.chunks {
            chunk.verify();
        }
    }
}

impl<'a> IntoIterator for &'a Backtrace {
    type Item = super::iterator::BacktraceElement;
    type IntoIter = BacktraceIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_charges_heap() {
        let heap = Heap::unbounded();
        let backtrace = Backtrace::allocate(&heap, 8).unwrap();
        assert!(heap.used() >= chunk_payload_bytes(8));
        assert_eq!(backtrace.chunk_count(), 1);
        assert_eq!(backtrace.head().occupied(), 0);
        drop(backtrace);
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn test_allocation_failure() {
        let heap = Heap::with_limit(16);
        assert!(matches!(
            Backtrace::allocate(&heap, 32),
            Err(HeapError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_empty_store_has_no_hidden_top() {
        let heap = Heap::unbounded();
        let backtrace = Backtrace::allocate(&heap, 2).unwrap();
        assert!(!backtrace.has_hidden_top_frame());
        assert_eq!(backtrace.frame_count(), 0);
    }
}

//! Managed heap allocation budget
//!
//! Backtrace chunks and boxed markers are "heap-resident": every allocation is
//! charged against a shared [`Heap`] and may fail with
//! [`HeapError::OutOfMemory`]. The charge is returned when the owning
//! [`HeapReservation`] is dropped, which is how a collected exception gives
//! its trace memory back.

use crate::safepoint;
use kestrel_config::HeapConfig;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Per-object header charged on top of payload bytes
pub const OBJECT_HEADER_BYTES: usize = 16;

/// Heap allocation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeapError {
    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },
}

#[derive(Debug)]
struct HeapInner {
    limit: Option<usize>,
    used: AtomicUsize,
    allocations: AtomicU64,
}

/// Shared allocation budget
///
/// Cloning yields another handle onto the same budget.
#[derive(Debug, Clone)]
pub struct Heap {
    inner: Arc<HeapInner>,
}

impl Heap {
    /// A heap without an upper bound
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// A heap that refuses allocations beyond `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self::build(Some(limit))
    }

    pub fn from_config(config: &HeapConfig) -> Self {
        Self::build(config.limit_bytes)
    }

    fn build(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(HeapInner {
                limit,
                used: AtomicUsize::new(0),
                allocations: AtomicU64::new(0),
            }),
        }
    }

    /// Charge `payload` bytes (plus the object header) against the budget
    ///
    /// This is a potential safepoint: callers inside a no-safepoint scope must
    /// pause it first.
    pub fn allocate(&self, payload: usize) -> Result<HeapReservation, HeapError> {
        safepoint::verify_safepoint_allowed();

        let bytes = payload.saturating_add(OBJECT_HEADER_BYTES);
        let mut used = self.inner.used.load(Ordering::Relaxed);
        loop {
            let next = used.saturating_add(bytes);
            if let Some(limit) = self.inner.limit {
                if next > limit {
                    return Err(HeapError::OutOfMemory {
                        requested: bytes,
                        available: limit.saturating_sub(used),
                    });
                }
            }
            match self.inner.used.compare_exchange_weak(
                used,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => used = actual,
            }
        }

        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(HeapReservation {
            heap: Arc::clone(&self.inner),
            bytes,
        })
    }

    /// Allocate a boxed boolean object
    pub fn box_boolean(&self, value: bool) -> Result<BoxedBool, HeapError> {
        let reservation = self.allocate(std::mem::size_of::<bool>())?;
        Ok(BoxedBool {
            value,
            _reservation: reservation,
        })
    }

    /// Bytes currently charged
    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    /// Bytes still available, `None` when unbounded
    pub fn available(&self) -> Option<usize> {
        self.inner.limit.map(|limit| limit.saturating_sub(self.used()))
    }

    /// Number of successful allocations since creation
    pub fn allocation_count(&self) -> u64 {
        self.inner.allocations.load(Ordering::Relaxed)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Ownership of charged bytes; released on drop
#[derive(Debug)]
pub struct HeapReservation {
    heap: Arc<HeapInner>,
    bytes: usize,
}

impl HeapReservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for HeapReservation {
    fn drop(&mut self) {
        self.heap.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

/// A heap-allocated boolean, used as a presence marker
#[derive(Debug)]
pub struct BoxedBool {
    value: bool,
    _reservation: HeapReservation,
}

impl BoxedBool {
    pub fn value(&self) -> bool {
        self.value
    }
}

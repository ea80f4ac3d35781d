//! No-safepoint scopes
//!
//! A stack walk inspects frames that a concurrent collection could move, so
//! the walker runs inside a [`NoSafepointVerifier`]: while one is active the
//! thread promises not to allocate or block. Designated allocation points open
//! a [`PauseNoSafepointVerifier`], during which a collection may happen; when
//! the pause ends the scope is re-armed.
//!
//! The bookkeeping is per thread. Heap allocation calls
//! [`verify_safepoint_allowed`], which panics in debug builds when the
//! promise is broken.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static NO_SAFEPOINT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Number of active (unpaused) no-safepoint scopes on this thread
pub fn no_safepoint_depth() -> usize {
    NO_SAFEPOINT_DEPTH.with(|depth| depth.get())
}

/// True when the current thread may reach a safepoint (allocate, block)
pub fn safepoint_allowed() -> bool {
    no_safepoint_depth() == 0
}

/// Debug check used at allocation sites
#[inline]
pub fn verify_safepoint_allowed() {
    debug_assert!(
        safepoint_allowed(),
        "possible safepoint reached inside a no-safepoint scope"
    );
}

/// Scope in which the current thread must not reach a safepoint
///
/// Not `Send`: the scope belongs to the thread that opened it.
#[derive(Debug)]
pub struct NoSafepointVerifier {
    active: bool,
    _not_send: PhantomData<*const ()>,
}

impl NoSafepointVerifier {
    pub fn new() -> Self {
        NO_SAFEPOINT_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            active: true,
            _not_send: PhantomData,
        }
    }

    /// Open an allocation window
    pub fn pause(&mut self) -> PauseNoSafepointVerifier<'_> {
        PauseNoSafepointVerifier::new(self)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for NoSafepointVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NoSafepointVerifier {
    fn drop(&mut self) {
        if self.active {
            NO_SAFEPOINT_DEPTH.with(|depth| depth.set(depth.get() - 1));
        }
    }
}

/// Temporarily lifts an enclosing [`NoSafepointVerifier`]
#[derive(Debug)]
pub struct PauseNoSafepointVerifier<'a> {
    verifier: &'a mut NoSafepointVerifier,
}

impl<'a> PauseNoSafepointVerifier<'a> {
    fn new(verifier: &'a mut NoSafepointVerifier) -> Self {
        debug_assert!(verifier.active, "pausing an inactive no-safepoint scope");
        NO_SAFEPOINT_DEPTH.with(|depth| depth.set(depth.get() - 1));
        verifier.active = false;
        Self { verifier }
    }
}

impl Drop for PauseNoSafepointVerifier<'_> {
    fn drop(&mut self) {
        NO_SAFEPOINT_DEPTH.with(|depth| depth.set(depth.get() + 1));
        self.verifier.active = true;
    }
}

//! Exception backtrace capture and materialization
//!
//! Capture walks the current thread once, filters the exception machinery's
//! own frames and records each remaining frame as
//! `(method ordinal, bci + class version, class mirror, method name)` in a
//! chunked store. Materialization replays the store and re-resolves every
//! frame against the class's versions at that moment, so frames whose code
//! has since been replaced degrade to a "Redefined" marker instead of
//! failing.
//!
//! - `location` - packed bci/version field and the version guard
//! - `chunk` - the chunked store
//! - `builder` - incremental store construction
//! - `walker` - stack walking over interpreted and compiled frames
//! - `filter` - frame filtering policy
//! - `iterator` - stored frame replay
//! - `element` - display-ready frame records
//! - `print` - text rendering

pub mod builder;
pub mod chunk;
pub mod element;
pub mod filter;
pub mod iterator;
pub mod location;
pub mod print;
pub mod walker;

pub use builder::BacktraceBuilder;
pub use chunk::{Backtrace, ChunkId, FrameChunk};
pub use element::{FrameStatus, StackTraceElement, NATIVE_LINE};
pub use filter::{FilterDecision, FrameFilter};
pub use iterator::{BacktraceElement, BacktraceIterator};
pub use print::{print_stack_element, print_stack_trace, stack_trace_string, NO_STACK_TRACE};
pub use walker::{FrameKind, StackWalker, WalkedFrame};

use crate::code::DebugInfoError;
use crate::exception::Throwable;
use crate::heap::HeapError;
use crate::oops::{Klass, Method};
use crate::thread::ManagedThread;
use crate::universe::Universe;
use std::sync::Arc;
use thiserror::Error;

/// Log target for capture events
pub const LOG_TARGET: &str = "kestrel::stacktrace";

/// Backtrace errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("backtrace allocation failed: {0}")]
    OutOfMemory(#[from] HeapError),

    #[error("corrupt compiled frame: {0}")]
    DebugInfo(#[from] DebugInfoError),

    #[error("stack trace depth {depth} does not match {length} output elements")]
    DepthMismatch { depth: usize, length: usize },

    #[error("throwable has no backtrace")]
    MissingBacktrace,

    #[error("bci {bci} of {method} does not fit a stored location")]
    BciOutOfRange { method: String, bci: i32 },

    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),
}

pub type TraceResult<T> = Result<T, TraceError>;

/// Give a runtime-created throwable an empty store to be refilled later
pub fn allocate_backtrace(universe: &Universe, throwable: &mut Throwable) -> TraceResult<()> {
    let config = universe.backtrace_config();
    if !config.enabled {
        return Ok(());
    }
    let builder = BacktraceBuilder::new(universe.heap(), config.chunk_size)?;
    throwable.set_backtrace(builder.finish(), 0);
    Ok(())
}

/// Capture the current stack of `thread` into `throwable`
///
/// `method` is the method about to be invoked; it is recorded alone when the
/// thread has no managed frames yet. Returns the recorded depth. On failure
/// the throwable is left without a backtrace.
pub fn fill_in_stack_trace(
    universe: &Universe,
    throwable: &mut Throwable,
    thread: &ManagedThread,
    method: Option<&Arc<Method>>,
) -> TraceResult<usize> {
    if !universe.backtrace_config().enabled || !universe.should_fill_in_stack_trace(throwable) {
        return Ok(throwable.depth());
    }

    throwable.clear_backtrace();
    let klass = Arc::clone(throwable.klass());
    match capture(universe, &klass, thread, method) {
        Ok(Some((backtrace, depth))) => {
            tracing::info!(target: LOG_TARGET, class = %klass.external_name(), depth, "stack trace filled");
            throwable.set_backtrace(backtrace, depth);
            Ok(depth)
        }
        Ok(None) => Ok(0),
        Err(err) => {
            tracing::warn!(
                target: LOG_TARGET,
                class = %klass.external_name(),
                error = %err,
                "stack trace capture abandoned"
            );
            Err(err)
        }
    }
}

fn capture(
    universe: &Universe,
    klass: &Klass,
    thread: &ManagedThread,
    method: Option<&Arc<Method>>,
) -> TraceResult<Option<(Backtrace, usize)>> {
    let config = universe.backtrace_config();
    let max_depth = config.max_depth;
    let mut builder = BacktraceBuilder::new(universe.heap(), config.chunk_size)?;

    if !thread.has_last_managed_frame() {
        let Some((method, holder)) =
            method.and_then(|method| method.holder().map(|holder| (method, holder)))
        else {
            return Ok(None);
        };
        builder.push(method, &holder, 0)?;
        return Ok(Some((builder.finish(), 1)));
    }

    let mut filter = FrameFilter::new(klass, universe.vm_symbols(), config.show_hidden_frames);
    for frame in StackWalker::new(thread.frames()) {
        if max_depth != 0 && builder.depth() == max_depth {
            break;
        }
        let frame = frame?;
        match filter.decide(&frame.method) {
            FilterDecision::Record => builder.push(&frame.method, &frame.holder, frame.bci)?,
            FilterDecision::SkipHidden => {
                if builder.depth() == 0 {
                    builder.set_has_hidden_top_frame()?;
                }
                tracing::trace!(
                    method = %frame.method.external_name(),
                    kind = ?frame.kind,
                    "hidden frame skipped"
                );
            }
            decision => {
                tracing::trace!(
                    method = %frame.method.external_name(),
                    kind = ?frame.kind,
                    ?decision,
                    "frame filtered"
                );
            }
        }
    }

    let depth = builder.depth();
    Ok(Some((builder.finish(), depth)))
}

/// Refill the store of a preallocated throwable without allocating
///
/// No frames are filtered; at most one chunk's worth is recorded. The store
/// stays on the throwable even when the walk fails part way.
pub fn fill_in_stack_trace_of_preallocated_backtrace(
    universe: &Universe,
    throwable: &mut Throwable,
    thread: &ManagedThread,
) -> TraceResult<usize> {
    if !universe.backtrace_config().enabled {
        return Ok(0);
    }
    let Some(backtrace) = throwable.take_backtrace() else {
        tracing::warn!(target: LOG_TARGET, "preallocated throwable has no backtrace store");
        return Ok(0);
    };

    let limit = backtrace.chunk_size();
    let mut builder = BacktraceBuilder::over(universe.heap(), backtrace);
    let mut result = Ok(());
    for frame in StackWalker::new(thread.frames()) {
        let pushed = frame
            .map_err(TraceError::from)
            .and_then(|frame| builder.push(&frame.method, &frame.holder, frame.bci));
        if let Err(err) = pushed {
            result = Err(err);
            break;
        }
        if builder.depth() >= limit {
            break;
        }
    }

    let depth = builder.depth();
    throwable.set_backtrace(builder.finish(), depth);
    tracing::info!(target: LOG_TARGET, class = %throwable.klass().external_name(), depth, "preallocated stack trace filled");
    result.map(|()| depth)
}

/// Materialize every frame into caller-provided elements
///
/// `elements` must have exactly as many entries as the recorded depth.
pub fn get_stack_trace_elements(
    throwable: &Throwable,
    elements: &mut [StackTraceElement],
) -> TraceResult<()> {
    let backtrace = throwable.backtrace().ok_or(TraceError::MissingBacktrace)?;
    let mismatch = TraceError::DepthMismatch {
        depth: throwable.depth(),
        length: elements.len(),
    };
    if elements.len() != throwable.depth() {
        return Err(mismatch);
    }

    let mut frames = backtrace.iter();
    for element in elements.iter_mut() {
        let frame = frames.next().ok_or_else(|| mismatch.clone())?;
        element.fill_in_from(&frame);
    }
    Ok(())
}

/// Materialize every frame; empty when there is no backtrace
pub fn stack_trace(throwable: &Throwable) -> Vec<StackTraceElement> {
    throwable
        .backtrace()
        .map(|backtrace| {
            backtrace
                .iter()
                .map(|frame| StackTraceElement::from_backtrace(&frame))
                .collect()
        })
        .unwrap_or_default()
}

/// Method and bci of the innermost recorded frame
///
/// `None` when there is no trace, when the innermost walked frame was hidden,
/// or when its method has since been redefined.
pub fn get_top_method_and_bci(throwable: &Throwable) -> Option<(Arc<Method>, i32)> {
    let backtrace = throwable.backtrace()?;
    let mut frames = backtrace.iter();
    if !frames.has_more() || backtrace.has_hidden_top_frame() {
        return None;
    }
    let top = frames.next()?;
    let method = top.live_method()?;
    Some((method, top.bci))
}

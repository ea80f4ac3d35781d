//! Exception objects
//!
//! A [`Throwable`] owns its captured [`Backtrace`]. The backtrace is published
//! by moving a finished store into the throwable, after which it is only read.

use crate::backtrace::Backtrace;
use crate::oops::Klass;
use std::fmt;
use std::sync::Arc;

/// A raised error condition
pub struct Throwable {
    klass: Arc<Klass>,
    message: Option<String>,
    cause: Option<Box<Throwable>>,
    backtrace: Option<Backtrace>,
    depth: usize,
    preallocated: bool,
}

impl Throwable {
    pub fn new(klass: &Arc<Klass>, message: Option<&str>) -> Self {
        Self {
            klass: Arc::clone(klass),
            message: message.map(str::to_string),
            cause: None,
            backtrace: None,
            depth: 0,
            preallocated: false,
        }
    }

    /// A throwable whose backtrace store is set up once and refilled in place
    pub(crate) fn preallocated(klass: &Arc<Klass>) -> Self {
        Self {
            preallocated: true,
            ..Self::new(klass, None)
        }
    }

    pub fn with_cause(mut self, cause: Throwable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn klass(&self) -> &Arc<Klass> {
        &self.klass
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, message: Option<&str>) {
        self.message = message.map(str::to_string);
    }

    pub fn cause(&self) -> Option<&Throwable> {
        self.cause.as_deref()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref()
    }

    /// Number of frames recorded by the last capture
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_preallocated(&self) -> bool {
        self.preallocated
    }

    pub(crate) fn set_backtrace(&mut self, backtrace: Backtrace, depth: usize) {
        self.backtrace = Some(backtrace);
        self.depth = depth;
    }

    pub(crate) fn take_backtrace(&mut self) -> Option<Backtrace> {
        self.depth = 0;
        self.backtrace.take()
    }

    pub(crate) fn clear_backtrace(&mut self) {
        self.backtrace = None;
        self.depth = 0;
    }
}

/// `ExternalClassName` or `ExternalClassName: message`
impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.klass.external_name())?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throwable")
            .field("class", self.klass.external_name())
            .field("message", &self.message)
            .field("depth", &self.depth)
            .field("cause", &self.cause)
            .finish()
    }
}

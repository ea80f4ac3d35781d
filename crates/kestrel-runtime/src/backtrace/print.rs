//! Text rendering of throwables and frames

use super::element::StackTraceElement;
use crate::exception::Throwable;
use crate::oops::Method;
use std::io::{self, Write};

/// Printed in place of frames when a throwable carries no backtrace
pub const NO_STACK_TRACE: &str = "\t<<no stack trace available>>";

fn write_frame<W: Write>(out: &mut W, element: &StackTraceElement) -> io::Result<()> {
    writeln!(out, "\tat {}", element)
}

/// Print `throwable` with its frames, then each cause with its own frames
///
/// A throwable without a backtrace prints the no-trace marker and ends the
/// output, causes included.
pub fn print_stack_trace<W: Write>(throwable: &Throwable, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", throwable)?;

    let mut current = Some(throwable);
    while let Some(throwable) = current {
        let Some(backtrace) = throwable.backtrace() else {
            writeln!(out, "{}", NO_STACK_TRACE)?;
            return Ok(());
        };
        for frame in backtrace {
            write_frame(out, &StackTraceElement::from_backtrace(&frame))?;
        }

        current = throwable.cause();
        if let Some(cause) = current {
            writeln!(out, "Caused by: {}", cause)?;
        }
    }
    Ok(())
}

/// [`print_stack_trace`] into a string
pub fn stack_trace_string(throwable: &Throwable) -> String {
    let mut buffer = Vec::new();
    // writes into a Vec cannot fail
    let _ = print_stack_trace(throwable, &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Print a single live frame
pub fn print_stack_element<W: Write>(out: &mut W, method: &Method, bci: i32) -> io::Result<()> {
    match StackTraceElement::create(method, bci) {
        Some(element) => write_frame(out, &element),
        None => writeln!(out, "\tat {}(Redefined)", method.external_name()),
    }
}

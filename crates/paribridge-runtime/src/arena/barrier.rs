//! Error barrier for foreign calls
//!
//! The foreign library reports errors by jumping out of whatever it is doing.
//! Here that jump is an unwind carrying a [`ForeignError`] payload, raised by
//! [`pari_err`]. Every entry point that may reach foreign code runs inside
//! [`guard`], which stops the unwind, rewinds the arena top to where it was on
//! entry and turns the payload into an ordinary `RuntimeError`.
//!
//! Panics that do not carry a `ForeignError` are bugs, not foreign errors, and
//! are resumed unchanged.

use crate::arena;
use crate::value::RuntimeError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use thiserror::Error;
use tracing::debug;

/// Class of a foreign-library error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignErrorKind {
    /// The arena cannot grow any further
    StackOverflow,
    /// Division by zero or a non-invertible element
    Inverse,
    /// Operands of the wrong shape
    Type,
    /// Value outside the domain of the operation
    Domain,
    /// Integer does not fit the requested machine type
    Overflow,
    /// Internal inconsistency
    Bug,
}

impl fmt::Display for ForeignErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForeignErrorKind::StackOverflow => "stack overflow",
            ForeignErrorKind::Inverse => "impossible inverse",
            ForeignErrorKind::Type => "incorrect type",
            ForeignErrorKind::Domain => "domain error",
            ForeignErrorKind::Overflow => "overflow",
            ForeignErrorKind::Bug => "bug",
        };
        f.write_str(name)
    }
}

/// Error raised inside the foreign library
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in {context}")]
pub struct ForeignError {
    pub kind: ForeignErrorKind,
    /// Routine (and detail) that raised the error
    pub context: String,
}

impl ForeignError {
    pub fn new(kind: ForeignErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }

    /// Whether the arena has to be re-initialised with more room
    pub fn is_exhaustion(&self) -> bool {
        self.kind == ForeignErrorKind::StackOverflow
    }
}

static QUIET_HOOK: Once = Once::new();

/// Keep the default panic hook from reporting foreign errors
///
/// Foreign errors are ordinary control flow for the bridge; only genuine
/// panics should reach the previous hook.
pub(crate) fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ForeignError>().is_none() {
                previous(info);
            }
        }));
    });
}

/// Raise a foreign error (does not return)
pub fn pari_err(kind: ForeignErrorKind, context: impl Into<String>) -> ! {
    install_quiet_hook();
    panic::panic_any(ForeignError::new(kind, context))
}

/// Run `f`, converting a foreign error unwind into `Err`
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, ForeignError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<ForeignError>() {
            Ok(error) => Err(*error),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// Run a foreign-touching operation inside the barrier
///
/// Fails with `NotInitialized` before running `f` when the thread has no
/// arena. On any error the arena top is reset to its value at entry, so
/// partially built cells are reclaimed immediately.
pub(crate) fn guard<T>(
    f: impl FnOnce() -> Result<T, RuntimeError>,
) -> Result<T, RuntimeError> {
    let mark = arena::mark()?;
    let outcome = catch(f);
    let error = match outcome {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(error)) => error,
        Err(foreign) => {
            debug!(kind = %foreign.kind, context = %foreign.context, "foreign error caught");
            RuntimeError::Foreign(foreign)
        }
    };
    arena::rewind(mark);
    Err(error)
}

/// Like [`guard`], but the arena top is restored on success too
///
/// For operations whose result lives entirely on the host side. `f` must not
/// wrap any cell it allocates into a handle.
pub(crate) fn scratch<T>(
    f: impl FnOnce() -> Result<T, RuntimeError>,
) -> Result<T, RuntimeError> {
    let mark = arena::mark()?;
    let outcome = guard(f);
    arena::rewind(mark);
    outcome
}

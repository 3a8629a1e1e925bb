//! paribridge runtime - host bridge to a foreign number theory library
//!
//! This library provides:
//! - A per-thread arena that owns every foreign value (`arena`)
//! - Conversion between foreign cells and host values (`ffi::marshal`)
//! - Opaque, generation-checked handles to foreign cells (`ffi::handle`)
//! - Name-based dynamic calls of foreign functions (`ffi::caller`)
//! - The fixed table of host entry points (`bindings`)
//! - RAII sessions over all of the above (`runtime`)

#[cfg(not(target_pointer_width = "64"))]
compile_error!("paribridge-runtime requires a 64-bit target");

/// paribridge runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod arena;
pub mod bindings;
pub mod ffi;
pub mod runtime;
pub mod value;

// Re-export commonly used types
pub use arena::{ArenaError, ArenaOptions, ArenaStats, ForeignError, ForeignErrorKind, LimbOrder};
pub use bindings::{HostFunction, HostFunctions, HOST_FUNCTIONS};
pub use ffi::{CallError, ForeignFunction, ForeignHandle, LoadError, MarshalError, SymbolResolver};
pub use runtime::Bridge;
pub use value::{Permutation, Rational, RuntimeError, Value, ValueArray};

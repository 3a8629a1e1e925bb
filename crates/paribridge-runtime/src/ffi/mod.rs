//! Foreign Function Interface (FFI) infrastructure
//!
//! Lets host code work with values owned by the foreign library via:
//! - Opaque handles to arena cells (`handle`)
//! - Value marshalling, cells ↔ host values (`marshal`)
//! - Symbol resolution through exports and `libloading` (`loader`)
//! - Arity-polymorphic calls, 0 to 5 arguments (`caller`)
//!
//! # Safety
//!
//! FFI operations involve `unsafe` code and careful memory management.
//! All unsafe code is isolated in this module and in `arena`, with safe
//! wrappers: host code only ever sees `ForeignHandle`s, never raw cells.

pub mod caller;
pub mod handle;
pub mod loader;
pub mod marshal;
pub mod types;

pub use caller::{bind, call0, call1, call2, call3, call4, call5, CallError, ForeignFunction};
pub use handle::{live_handles, unwrap_raw, unwrap_tag, ForeignHandle};
pub use loader::{LoadError, ResolvedSymbol, SymbolOrigin, SymbolResolver};
pub use marshal::MarshalError;
pub use types::{Arity, HandleKind, NativeEntry, Tag};

//! Opaque handles to foreign cells
//!
//! A `ForeignHandle` is the only way host code holds on to a foreign value. It
//! records the arena generation the cell was issued in, so a handle that
//! outlives its arena is detected and rejected rather than dereferenced.
//!
//! Live handles are counted per cell in a thread-local registry. The arena
//! consults it before reclaiming memory: `reset` is refused while any handle
//! is live, and `close` reports how many handles it invalidates.

use crate::arena::{self, barrier, format, Gen};
use crate::ffi::marshal;
use crate::ffi::types::HandleKind;
use crate::value::{RuntimeError, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Default)]
struct HandleRegistry {
    generation: u64,
    open: bool,
    /// Live handle count per cell address
    cells: HashMap<usize, usize>,
}

impl HandleRegistry {
    fn retain(&mut self, addr: usize, generation: u64) {
        if self.open && self.generation == generation {
            *self.cells.entry(addr).or_insert(0) += 1;
        }
    }

    fn release(&mut self, addr: usize, generation: u64) {
        if !self.open || self.generation != generation {
            return;
        }
        if let Some(count) = self.cells.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.cells.remove(&addr);
            }
        }
    }

    fn live(&self) -> usize {
        self.cells.values().sum()
    }
}

thread_local! {
    static REGISTRY: RefCell<HandleRegistry> = RefCell::new(HandleRegistry::default());
}

pub(crate) fn begin_generation(generation: u64) {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        registry.generation = generation;
        registry.open = true;
        registry.cells.clear();
    });
}

/// Retire a generation, returning the number of handles it leaves stale
pub(crate) fn end_generation(generation: u64) -> usize {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        if registry.generation != generation {
            return 0;
        }
        let live = registry.live();
        registry.open = false;
        registry.cells.clear();
        live
    })
}

/// Number of live handles into this thread's arena
pub fn live_handles() -> usize {
    REGISTRY.with(|registry| registry.borrow().live())
}

/// Host-side reference to a foreign cell
pub struct ForeignHandle {
    kind: HandleKind,
    raw: Gen,
    generation: u64,
}

impl ForeignHandle {
    /// Wrap a cell of the live arena
    pub(crate) fn wrap(raw: Gen) -> Result<Self, RuntimeError> {
        let generation = arena::generation().ok_or(arena::ArenaError::NotInitialized)?;
        REGISTRY.with(|registry| registry.borrow_mut().retain(raw.addr(), generation));
        Ok(Self {
            kind: HandleKind::Gen,
            raw,
            generation,
        })
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Arena generation the cell belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cell address, for identity comparisons only
    pub fn addr(&self) -> usize {
        self.raw.addr()
    }

    /// Whether the arena generation of this handle is still live
    pub fn is_live(&self) -> bool {
        arena::generation() == Some(self.generation)
    }

    /// The raw cell, if its arena is still live
    pub fn raw(&self) -> Result<Gen, RuntimeError> {
        if self.is_live() {
            Ok(self.raw)
        } else {
            Err(RuntimeError::StaleHandle {
                generation: self.generation,
            })
        }
    }

    /// Numeric foreign type code of the cell
    pub fn foreign_type(&self) -> Result<u8, RuntimeError> {
        let raw = self.raw()?;
        // SAFETY: raw belongs to the live generation
        Ok(unsafe { raw.code() })
    }

    /// The arena's own rendering of the cell
    pub fn describe(&self) -> Result<String, RuntimeError> {
        let raw = self.raw()?;
        barrier::guard(|| {
            let order = arena::limb_order()?;
            // SAFETY: raw belongs to the live generation
            Ok(unsafe { format::gen_to_string(raw, order) })
        })
    }

    /// Decode the cell into a host value
    pub fn to_host(&self) -> Result<Value, RuntimeError> {
        marshal::to_host(self)
    }
}

impl Clone for ForeignHandle {
    fn clone(&self) -> Self {
        REGISTRY.with(|registry| {
            registry
                .borrow_mut()
                .retain(self.raw.addr(), self.generation)
        });
        Self {
            kind: self.kind,
            raw: self.raw,
            generation: self.generation,
        }
    }
}

impl Drop for ForeignHandle {
    fn drop(&mut self) {
        // the registry may already be gone during thread teardown
        let _ = REGISTRY.try_with(|registry| {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.release(self.raw.addr(), self.generation);
            }
        });
    }
}

impl PartialEq for ForeignHandle {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.raw == other.raw
            && self.generation == other.generation
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHandle")
            .field("kind", &self.kind)
            .field("addr", &format_args!("{:#x}", self.raw.addr()))
            .field("generation", &self.generation)
            .finish()
    }
}

fn as_handle(value: &Value) -> Result<&ForeignHandle, RuntimeError> {
    match value {
        Value::Handle(handle) => Ok(handle),
        other => Err(RuntimeError::NotAHandle {
            type_name: other.type_name().to_string(),
        }),
    }
}

/// Discriminant of a handle held in a host value
pub fn unwrap_tag(value: &Value) -> Result<HandleKind, RuntimeError> {
    let handle = as_handle(value)?;
    handle.raw()?;
    Ok(handle.kind())
}

/// Raw cell of a handle held in a host value
pub fn unwrap_raw(value: &Value) -> Result<Gen, RuntimeError> {
    as_handle(value)?.raw()
}

/// Diagnostic rendering of a handle's cell
pub fn describe(handle: &ForeignHandle) -> Result<String, RuntimeError> {
    handle.describe()
}

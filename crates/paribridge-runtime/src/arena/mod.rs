//! The foreign arena
//!
//! A non-relocating stack of words owned by the foreign library. The whole
//! `max_size` is reserved when the arena is initialised, so cells never move;
//! allocation bumps the top (`avma`) downwards through a committed window that
//! starts at `initial_size` and doubles on demand up to `max_size`. Past that
//! point the foreign library raises its stack-overflow error.
//!
//! # Thread confinement
//!
//! Each thread owns at most one arena, kept in a thread-local slot. Cell
//! pointers (`Gen`) and handles are `!Send`, so foreign values can never be
//! observed from a thread other than the one whose arena holds them.
//!
//! # Lifecycle
//!
//! [`initialize`] must run before anything else touches foreign values. Every
//! other entry point reports `NotInitialized` when it has not. [`close`] frees
//! the arena and retires its generation: handles issued under it become
//! stale and are rejected instead of dereferenced.

pub mod barrier;
pub mod format;
pub mod layout;
pub mod library;

pub use barrier::{catch, pari_err, ForeignError, ForeignErrorKind};
pub use layout::{Gen, LimbOrder, Word, WORD_BYTES};

use crate::ffi::handle;
use crate::ffi::types::Tag;
use layout::{evallg, evallgefint, evalsigne, evaltyp, evalvarn};
use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Smallest arena accepted by [`initialize`], in bytes
pub const MIN_ARENA_BYTES: u64 = 4096;

/// Arena lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("the foreign arena has not been initialized on this thread")]
    NotInitialized,

    #[error("the foreign arena is already initialized on this thread")]
    AlreadyInitialized,

    #[error("invalid arena size: {reason}")]
    InvalidSize { reason: String },

    #[error("could not reserve {bytes} bytes for the foreign arena")]
    ReserveFailed { bytes: u64 },

    #[error("arena cannot be reset while {live} foreign handles are live")]
    Pinned { live: usize },
}

/// Parameters for [`initialize_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaOptions {
    /// Committed size in bytes at start-up
    pub initial_size: u64,
    /// Reserved size in bytes; the arena never grows past it
    pub max_size: u64,
    /// Limb orientation of integer cells
    pub limb_order: LimbOrder,
}

impl ArenaOptions {
    pub fn new(initial_size: u64, max_size: u64) -> Self {
        Self {
            initial_size,
            max_size,
            limb_order: LimbOrder::default(),
        }
    }

    pub fn with_limb_order(mut self, limb_order: LimbOrder) -> Self {
        self.limb_order = limb_order;
        self
    }

    fn validate(&self) -> Result<(), ArenaError> {
        if self.max_size < MIN_ARENA_BYTES {
            return Err(ArenaError::InvalidSize {
                reason: format!(
                    "max_size {} is below the minimum of {} bytes",
                    self.max_size, MIN_ARENA_BYTES
                ),
            });
        }
        if self.initial_size > self.max_size {
            return Err(ArenaError::InvalidSize {
                reason: format!(
                    "initial_size {} exceeds max_size {}",
                    self.initial_size, self.max_size
                ),
            });
        }
        if usize::try_from(self.max_size / WORD_BYTES as u64).is_err() {
            return Err(ArenaError::InvalidSize {
                reason: format!("max_size {} does not fit in memory", self.max_size),
            });
        }
        Ok(())
    }
}

impl Default for ArenaOptions {
    fn default() -> Self {
        ArenaOptions::new(8 << 20, 64 << 20)
    }
}

/// Snapshot of arena usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Bytes between the arena top and `avma`
    pub used: u64,
    /// Bytes currently committed
    pub committed: u64,
    /// Bytes reserved
    pub max: u64,
    /// Live foreign handles pinning cells of this arena
    pub live_handles: usize,
    pub generation: u64,
    pub limb_order: LimbOrder,
}

/// Position of the arena top, taken before an operation and restored on error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    generation: u64,
    avma: usize,
}

struct Arena {
    base: NonNull<Word>,
    /// Reserved words
    capacity: usize,
    /// Usable words, counted down from the top
    committed: usize,
    /// Index of the lowest allocated word; `capacity` when empty
    avma: usize,
    limb_order: LimbOrder,
    generation: u64,
}

impl Arena {
    /// Reserve the whole arena up front
    ///
    /// Fails instead of aborting when the allocator cannot provide
    /// `max_size` bytes.
    fn new(options: &ArenaOptions, generation: u64) -> Result<Self, ArenaError> {
        let capacity = (options.max_size / WORD_BYTES as u64) as usize;
        let committed = ((options.initial_size / WORD_BYTES as u64) as usize).clamp(1, capacity);
        let reserve_failed = ArenaError::ReserveFailed {
            bytes: options.max_size,
        };
        let layout = Layout::array::<Word>(capacity).map_err(|_| reserve_failed.clone())?;
        // SAFETY: validate() guarantees capacity > 0, so the layout is non-zero sized
        let raw = unsafe { alloc::alloc_zeroed(layout) } as *mut Word;
        let base = NonNull::new(raw).ok_or(reserve_failed)?;
        Ok(Self {
            base,
            capacity,
            committed,
            avma: capacity,
            limb_order: options.limb_order,
            generation,
        })
    }

    fn used(&self) -> usize {
        self.capacity - self.avma
    }

    /// Reserve `words` words, growing the committed window if needed.
    /// Returns `None` when even the full reservation is too small.
    fn alloc(&mut self, words: usize) -> Option<Gen> {
        let needed = self.used().checked_add(words)?;
        if needed > self.capacity {
            return None;
        }
        if needed > self.committed {
            let grown = self.committed.saturating_mul(2).max(needed).min(self.capacity);
            debug!(
                from = self.committed * WORD_BYTES,
                to = grown * WORD_BYTES,
                "growing arena window"
            );
            self.committed = grown;
        }
        self.avma -= words;
        // SAFETY: avma < capacity, so the offset stays inside the reservation
        Some(Gen::from_ptr(unsafe { self.base.as_ptr().add(self.avma) }))
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: base was allocated in `new` by the global allocator with the
        // layout of `capacity` words, which is the layout of this boxed slice
        unsafe {
            let slice = std::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.capacity);
            drop(Box::from_raw(slice));
        }
    }
}

thread_local! {
    static ARENA: RefCell<Option<Arena>> = const { RefCell::new(None) };
    static LAST_GENERATION: Cell<u64> = const { Cell::new(0) };
}

fn with_arena<R>(f: impl FnOnce(&mut Arena) -> R) -> Result<R, ArenaError> {
    ARENA.with(|slot| match slot.borrow_mut().as_mut() {
        Some(arena) => Ok(f(arena)),
        None => Err(ArenaError::NotInitialized),
    })
}

/// Initialise this thread's arena with default limb order
///
/// Returns the foreign library's version string as a liveness check.
pub fn initialize(initial_size: u64, max_size: u64) -> Result<String, ArenaError> {
    initialize_with(ArenaOptions::new(initial_size, max_size))
}

/// Initialise this thread's arena
pub fn initialize_with(options: ArenaOptions) -> Result<String, ArenaError> {
    options.validate()?;
    ARENA.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(ArenaError::AlreadyInitialized);
        }
        let generation = LAST_GENERATION.with(|last| last.get() + 1);
        let arena = Arena::new(&options, generation)?;
        LAST_GENERATION.with(|last| last.set(generation));
        barrier::install_quiet_hook();
        *slot = Some(arena);
        handle::begin_generation(generation);
        info!(
            initial_size = options.initial_size,
            max_size = options.max_size,
            limb_order = %options.limb_order,
            generation,
            "foreign arena initialized"
        );
        Ok(())
    })?;
    Ok(library::version_string())
}

/// Release this thread's arena
///
/// Handles still alive become stale; using them afterwards fails with
/// `StaleHandle`.
pub fn close() -> Result<(), ArenaError> {
    let arena = ARENA.with(|slot| slot.borrow_mut().take());
    let arena = arena.ok_or(ArenaError::NotInitialized)?;
    let live = handle::end_generation(arena.generation);
    if live > 0 {
        warn!(
            live,
            generation = arena.generation,
            "closing foreign arena with live handles; they are now stale"
        );
    }
    info!(generation = arena.generation, "foreign arena closed");
    drop(arena);
    Ok(())
}

/// Reclaim every cell of the arena
///
/// Refused while any handle still pins a cell.
pub fn reset() -> Result<(), ArenaError> {
    let live = handle::live_handles();
    if live > 0 {
        return Err(ArenaError::Pinned { live });
    }
    with_arena(|arena| {
        debug!(reclaimed = arena.used() * WORD_BYTES, "arena reset");
        arena.avma = arena.capacity;
    })
}

/// Whether this thread has a live arena
pub fn is_initialized() -> bool {
    ARENA.with(|slot| slot.borrow().is_some())
}

/// Generation of the live arena
pub fn generation() -> Option<u64> {
    ARENA.with(|slot| slot.borrow().as_ref().map(|arena| arena.generation))
}

/// Usage snapshot of the live arena
pub fn stats() -> Result<ArenaStats, ArenaError> {
    let live_handles = handle::live_handles();
    with_arena(|arena| ArenaStats {
        used: (arena.used() * WORD_BYTES) as u64,
        committed: (arena.committed * WORD_BYTES) as u64,
        max: (arena.capacity * WORD_BYTES) as u64,
        live_handles,
        generation: arena.generation,
        limb_order: arena.limb_order,
    })
}

/// Limb orientation of the live arena
pub fn limb_order() -> Result<LimbOrder, ArenaError> {
    with_arena(|arena| arena.limb_order)
}

pub(crate) fn mark() -> Result<Mark, ArenaError> {
    with_arena(|arena| Mark {
        generation: arena.generation,
        avma: arena.avma,
    })
}

/// Restore the arena top saved by [`mark`]
///
/// Only moves the top back up, and only within the same generation.
pub(crate) fn rewind(mark: Mark) {
    let rewound = with_arena(|arena| {
        if arena.generation == mark.generation && mark.avma >= arena.avma {
            arena.avma = mark.avma;
        }
    });
    if rewound.is_err() {
        // closed while the mark was held: its cells went with the arena
        debug!(generation = mark.generation, "rewind skipped, arena closed");
    }
}

/// Allocate `words` words, raising a foreign error when impossible
pub(crate) fn alloc(words: usize) -> Gen {
    match with_arena(|arena| arena.alloc(words)) {
        Ok(Some(cell)) => cell,
        Ok(None) => pari_err(
            ForeignErrorKind::StackOverflow,
            format!("new_chunk: the arena cannot hold {} more words", words),
        ),
        Err(_) => pari_err(ForeignErrorKind::Bug, "new_chunk: no arena on this thread"),
    }
}

/// Allocate a cell of `len` words with the given type code
pub(crate) fn cgetg_code(len: usize, code: u8) -> Gen {
    let cell = alloc(len);
    // SAFETY: freshly allocated, at least one word
    unsafe { cell.set_word(0, evaltyp(code) | evallg(len)) };
    cell
}

/// Allocate a cell of `len` words with the given type
pub(crate) fn cgetg(len: usize, tag: Tag) -> Gen {
    cgetg_code(len, tag.code())
}

/// Allocate an integer cell of `len` words; the sign word is left to the caller
pub(crate) fn cgeti(len: usize) -> Gen {
    cgetg(len, Tag::Int)
}

/// Integer cell from a machine word
pub(crate) fn stoi(x: i64) -> Gen {
    if x == 0 {
        let cell = cgeti(2);
        // SAFETY: two-word cell
        unsafe { cell.set_word(1, evalsigne(0) | evallgefint(2)) };
        return cell;
    }
    let cell = cgeti(3);
    // SAFETY: three-word cell
    unsafe {
        cell.set_word(1, evalsigne(if x < 0 { -1 } else { 1 }) | evallgefint(3));
        cell.set_word(2, x.unsigned_abs());
    }
    cell
}

/// Machine word from an integer cell, raising an overflow error if it does not fit
///
/// # Safety
///
/// `x` must point to a live integer cell.
pub(crate) unsafe fn itos(x: Gen) -> i64 {
    let sign = x.signe();
    match x.lgefint() {
        0..=2 => 0,
        3 => {
            let limb = x.word(2);
            match sign {
                0 => 0,
                s if s > 0 && limb <= i64::MAX as u64 => limb as i64,
                s if s < 0 && limb <= i64::MAX as u64 + 1 => (limb as i64).wrapping_neg(),
                _ => pari_err(ForeignErrorKind::Overflow, "t_INT-->long assignment"),
            }
        }
        _ => pari_err(ForeignErrorKind::Overflow, "t_INT-->long assignment"),
    }
}

/// String cell holding `bytes` followed by a NUL
pub(crate) fn strtogenstr(bytes: &[u8]) -> Gen {
    let payload_words = bytes.len() / WORD_BYTES + 1;
    let cell = cgetg(1 + payload_words, Tag::Str);
    // SAFETY: the payload area spans payload_words words, enough for the
    // bytes plus at least one NUL
    unsafe {
        let dst = cell.as_ptr().add(1) as *mut u8;
        std::ptr::write_bytes(dst, 0, payload_words * WORD_BYTES);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
    }
    cell
}

/// Header of an empty polynomial cell in variable 0
pub(crate) fn pol_header(sign: i8) -> Word {
    evalsigne(sign) | evalvarn(0)
}

/// Drop high-degree zero coefficients of a polynomial and fix its sign
///
/// An all-zero polynomial becomes the zero polynomial (length 2, sign 0).
///
/// # Safety
///
/// `x` must point to a live polynomial cell whose coefficients are set.
pub(crate) unsafe fn normalizepol(x: Gen) -> Gen {
    let mut len = x.lg();
    while len > 2 && is_exact_zero(x.gel(len - 1)) {
        len -= 1;
    }
    x.set_lg(len);
    x.set_signe(if len == 2 { 0 } else { 1 });
    x
}

unsafe fn is_exact_zero(x: Gen) -> bool {
    x.tag() == Some(Tag::Int) && x.signe() == 0
}

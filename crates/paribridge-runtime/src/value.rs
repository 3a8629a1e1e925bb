//! Host value representation
//!
//! The host side of the bridge:
//! - Integers: arbitrary precision (`num_bigint::BigInt`)
//! - Rationals: reduced, positive denominator other than 1
//! - Sequences: copy-on-write (ValueArray wrapping Rc<Vec<Value>>), value semantics
//! - Text: immutable byte strings
//! - Permutations: point images, narrow (u16) or wide (u32)
//! - Handles and bound foreign functions: references into the foreign side
//!
//! Values holding handles are confined to the thread that owns the arena, so
//! sharing uses `Rc`.

use crate::arena::{ArenaError, ForeignError};
use crate::ffi::caller::{CallError, ForeignFunction};
use crate::ffi::handle::ForeignHandle;
use crate::ffi::loader::LoadError;
use crate::ffi::marshal::MarshalError;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Copy-on-write sequence. Cheap to clone (refcount bump).
/// Mutations on a shared sequence clone the inner Vec first (Rc::make_mut).
#[derive(Clone, Debug, Default)]
pub struct ValueArray(Rc<Vec<Value>>);

impl ValueArray {
    pub fn new() -> Self {
        ValueArray(Rc::new(Vec::new()))
    }

    pub fn from_vec(v: Vec<Value>) -> Self {
        ValueArray(Rc::new(v))
    }

    /// Read access, no clone needed.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Mutating access; copies first if shared.
    pub fn push(&mut self, value: Value) {
        Rc::make_mut(&mut self.0).push(value);
    }

    pub fn set(&mut self, index: usize, value: Value) -> bool {
        let inner = Rc::make_mut(&mut self.0);
        if index < inner.len() {
            inner[index] = value;
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Returns true if this sequence is the sole owner (no other clones).
    pub fn is_exclusively_owned(&self) -> bool {
        Rc::strong_count(&self.0) == 1
    }

    /// Convert to an owned Vec, cloning only if shared.
    pub fn into_vec(self) -> Vec<Value> {
        Rc::try_unwrap(self.0).unwrap_or_else(|rc| (*rc).clone())
    }
}

impl PartialEq for ValueArray {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl std::ops::Index<usize> for ValueArray {
    type Output = Value;
    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl From<Vec<Value>> for ValueArray {
    fn from(v: Vec<Value>) -> Self {
        ValueArray::from_vec(v)
    }
}

impl FromIterator<Value> for ValueArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ValueArray(Rc::new(iter.into_iter().collect()))
    }
}

/// Reduced fraction with a positive denominator other than 1
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rational {
    numer: BigInt,
    denom: BigInt,
}

impl Rational {
    /// Reduce `numer / denom`; `None` when the denominator is zero
    pub fn new(numer: BigInt, denom: BigInt) -> Option<Self> {
        if denom.is_zero() {
            return None;
        }
        let gcd = numer.gcd(&denom);
        let (mut numer, mut denom) = (numer / &gcd, denom / &gcd);
        if denom.is_negative() {
            numer = -numer;
            denom = -denom;
        }
        Some(Self { numer, denom })
    }

    pub fn numer(&self) -> &BigInt {
        &self.numer
    }

    pub fn denom(&self) -> &BigInt {
        &self.denom
    }

    pub fn is_integer(&self) -> bool {
        self.denom.is_one()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

/// Permutation of the points `0..degree`, stored as images
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permutation {
    /// Degree below 2^16
    Narrow(Rc<[u16]>),
    Wide(Rc<[u32]>),
}

impl Permutation {
    /// Permutation from 0-based images, which must be a bijection of `0..len`
    pub fn narrow(images: Vec<u16>) -> Result<Self, RuntimeError> {
        check_bijection(images.iter().map(|&i| i as usize), images.len())?;
        Ok(Permutation::Narrow(images.into()))
    }

    /// Permutation from 0-based images, which must be a bijection of `0..len`
    pub fn wide(images: Vec<u32>) -> Result<Self, RuntimeError> {
        check_bijection(images.iter().map(|&i| i as usize), images.len())?;
        Ok(Permutation::Wide(images.into()))
    }

    pub fn degree(&self) -> usize {
        match self {
            Permutation::Narrow(images) => images.len(),
            Permutation::Wide(images) => images.len(),
        }
    }

    /// 0-based image of every point
    pub fn images(&self) -> Vec<u32> {
        match self {
            Permutation::Narrow(images) => images.iter().map(|&i| i as u32).collect(),
            Permutation::Wide(images) => images.to_vec(),
        }
    }

    /// Disjoint cycles of length at least 2, 0-based
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let images = self.images();
        let mut seen = vec![false; images.len()];
        let mut cycles = Vec::new();
        for start in 0..images.len() {
            if seen[start] || images[start] as usize == start {
                continue;
            }
            let mut cycle = Vec::new();
            let mut point = start;
            while !seen[point] {
                seen[point] = true;
                cycle.push(point);
                point = images[point] as usize;
            }
            cycles.push(cycle);
        }
        cycles
    }
}

fn check_bijection(images: impl Iterator<Item = usize>, len: usize) -> Result<(), RuntimeError> {
    let mut hit = vec![false; len];
    for image in images {
        match hit.get_mut(image) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(RuntimeError::InvalidArgument {
                    msg: format!("not a permutation of {} points (image {})", len, image),
                })
            }
        }
    }
    Ok(())
}

/// Cycle notation with 1-based points: `(1,2,3)(4,5)`, identity `()`
impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cycles = self.cycles();
        if cycles.is_empty() {
            return write!(f, "()");
        }
        for cycle in cycles {
            let points: Vec<String> = cycle.iter().map(|p| (p + 1).to_string()).collect();
            write!(f, "({})", points.join(","))?;
        }
        Ok(())
    }
}

/// Host value
#[derive(Clone)]
pub enum Value {
    /// No value (result of entries like `arena_close`)
    Null,
    /// Arbitrary-precision integer
    Integer(BigInt),
    /// Fraction that is not an integer
    Rational(Rational),
    /// Ordered sequence (copy-on-write, value semantics)
    Sequence(ValueArray),
    /// Byte string
    Text(Rc<[u8]>),
    Permutation(Permutation),
    /// Opaque reference to a foreign cell
    Handle(ForeignHandle),
    /// Foreign function resolved by name
    Function(ForeignFunction),
}

impl Value {
    pub fn integer(n: impl Into<BigInt>) -> Self {
        Value::Integer(n.into())
    }

    /// Fraction value, reduced; an integral fraction becomes an `Integer`
    ///
    /// Returns `None` when the denominator is zero.
    pub fn rational(numer: BigInt, denom: BigInt) -> Option<Self> {
        let rational = Rational::new(numer, denom)?;
        if rational.is_integer() {
            Some(Value::Integer(rational.numer))
        } else {
            Some(Value::Rational(rational))
        }
    }

    pub fn sequence(values: Vec<Value>) -> Self {
        Value::Sequence(ValueArray::from_vec(values))
    }

    pub fn text(s: impl AsRef<[u8]>) -> Self {
        Value::Text(Rc::from(s.as_ref()))
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Rational(_) => "rational",
            Value::Sequence(_) => "sequence",
            Value::Text(_) => "text",
            Value::Permutation(_) => "permutation",
            Value::Handle(_) => "handle",
            Value::Function(_) => "function",
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Value::Integer(n) => Some(n),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Content equality for host data; handles compare by cell and
    /// generation, functions by name and arity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Rational(a), Value::Rational(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Permutation(a), Value::Permutation(b)) => a.images() == b.images(),
            (Value::Handle(a), Value::Handle(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Rational(q) => write!(f, "{}", q),
            Value::Sequence(elements) => {
                let elements: Vec<String> = elements.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::Text(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Value::Permutation(p) => write!(f, "{}", p),
            Value::Handle(h) => write!(f, "<handle {:#x} gen {}>", h.addr(), h.generation()),
            Value::Function(func) => write!(f, "<foreign fn {}/{}>", func.name(), func.arity()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Integer(n) => write!(f, "Integer({})", n),
            Value::Rational(q) => write!(f, "Rational({})", q),
            Value::Sequence(elements) => write!(f, "Sequence({:?})", elements.as_slice()),
            Value::Text(bytes) => write!(f, "Text({:?})", String::from_utf8_lossy(bytes)),
            Value::Permutation(p) => write!(f, "Permutation({})", p),
            Value::Handle(h) => write!(f, "Handle({:?})", h),
            Value::Function(func) => write!(f, "Function({:?})", func),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::integer(n)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Integer(n)
    }
}

impl From<ForeignHandle> for Value {
    fn from(handle: ForeignHandle) -> Self {
        Value::Handle(handle)
    }
}

/// Runtime error type
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// Arena lifecycle (not initialised, bad sizes, pinned reset)
    #[error(transparent)]
    Arena(#[from] ArenaError),
    /// Value shape with no counterpart on the other side
    #[error(transparent)]
    Marshal(#[from] MarshalError),
    /// Symbol resolution and call arity
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Error raised inside the foreign library
    #[error("foreign error: {0}")]
    Foreign(#[from] ForeignError),
    /// Host value where a handle was required
    #[error("not a foreign handle: {type_name}")]
    NotAHandle { type_name: String },
    /// Handle whose arena generation has been closed
    #[error("stale handle from closed arena generation {generation}")]
    StaleHandle { generation: u64 },
    #[error("invalid argument: {msg}")]
    InvalidArgument { msg: String },
    /// Unknown host entry point
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },
    /// Host entry point called with the wrong number of arguments
    #[error("{name} expects {expected} arguments, got {got}")]
    WrongArgumentCount {
        name: String,
        expected: String,
        got: usize,
    },
}

impl RuntimeError {
    /// Whether the caller broke an arity contract
    ///
    /// Such errors are detected before any foreign code runs.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            RuntimeError::Call(CallError::ArityMismatch { .. })
                | RuntimeError::WrongArgumentCount { .. }
        )
    }

    /// Whether the error came out of the foreign library
    pub fn is_foreign(&self) -> bool {
        matches!(self, RuntimeError::Foreign(_))
    }
}

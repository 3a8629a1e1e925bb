//! Value marshalling - foreign cells ↔ host values
//!
//! Provides bidirectional conversion between arena cells and host values:
//! - `MarshalContext::to_host()`: decode a cell, recursively, into a `Value`
//! - `MarshalContext::to_foreign()`: build cells on the arena from a `Value`
//!
//! # Shapes
//!
//! | foreign | host |
//! |---|---|
//! | t_INT | `Integer` |
//! | t_FRAC | `Rational`, or `Integer` when the denominator is 1 |
//! | t_VEC, t_COL, t_MAT, t_INTMOD, t_POLMOD | `Sequence` of components |
//! | t_POL | `Sequence` of coefficients, lowest degree first |
//! | t_VECSMALL | `Sequence` of machine-sized integers |
//! | t_STR | `Text` |
//!
//! Every other shape is an `UnsupportedShape` error; nothing is ever returned
//! half-decoded.
//! Sequences nested deeper than [`MAX_NESTING`] are rejected in both
//! directions with `TooDeep`.
//!
//! # Memory Safety
//!
//! - Decoding reads cells only through `ForeignHandle`s checked for staleness
//! - Every public entry point runs inside the error barrier
//! - Integer limbs are reordered according to the arena's limb orientation

use crate::arena::barrier::{guard, scratch};
use crate::arena::layout::{evalsigne, evallgefint};
use crate::arena::library::mkpol;
use crate::arena::{self, cgeti, cgetg, stoi, Gen, LimbOrder};
use crate::ffi::handle::ForeignHandle;
use crate::ffi::types::Tag;
use crate::value::{Permutation, RuntimeError, Value, ValueArray};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use thiserror::Error;
use tracing::trace;

/// Marshal error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    /// Foreign cell with a type the marshaller does not decode
    #[error("unsupported foreign value shape: type {tag}{}", shape_name(.name))]
    UnsupportedShape {
        tag: u8,
        name: Option<&'static str>,
    },
    /// Host value with no foreign counterpart
    #[error("value not convertible: {type_name}")]
    NotConvertible { type_name: String },
    /// Sequence nested deeper than [`MAX_NESTING`]
    #[error("value nested deeper than {limit} levels")]
    TooDeep { limit: usize },
    /// Foreign cell whose components break the layout of its type
    #[error("malformed {tag} cell: {reason}")]
    Malformed { tag: Tag, reason: String },
}

fn shape_name(name: &Option<&'static str>) -> String {
    name.map(|n| format!(" ({})", n)).unwrap_or_default()
}

impl MarshalError {
    fn unsupported(code: u8) -> Self {
        MarshalError::UnsupportedShape {
            tag: code,
            name: Tag::from_code(code).map(Tag::name),
        }
    }

    fn not_convertible(value: &Value) -> Self {
        MarshalError::NotConvertible {
            type_name: value.type_name().to_string(),
        }
    }
}

/// Decode an integer cell
///
/// # Safety
///
/// `x` must point to a live integer cell.
pub(crate) unsafe fn decode_integer(x: Gen, order: LimbOrder) -> BigInt {
    let len = x.lgefint();
    let sign = x.signe();
    if sign == 0 || len <= 2 {
        return BigInt::zero();
    }
    let mut digits = Vec::with_capacity(2 * (len - 2));
    for i in 0..len - 2 {
        let limb = x.word(order.limb_index(i, len));
        digits.push(limb as u32);
        digits.push((limb >> 32) as u32);
    }
    let sign = if sign < 0 { Sign::Minus } else { Sign::Plus };
    BigInt::from_biguint(sign, BigUint::new(digits))
}

/// Encode an integer as a new cell
pub(crate) fn encode_integer(n: &BigInt, order: LimbOrder) -> Gen {
    if let Some(small) = n.to_i64() {
        return stoi(small);
    }
    let (sign, limbs) = n.to_u64_digits();
    let len = limbs.len() + 2;
    let cell = cgeti(len);
    let sign = if sign == Sign::Minus { -1 } else { 1 };
    // SAFETY: the cell holds len words
    unsafe {
        cell.set_word(1, evalsigne(sign) | evallgefint(len));
        for (i, limb) in limbs.iter().enumerate() {
            cell.set_word(order.limb_index(i, len), *limb);
        }
    }
    cell
}

/// Deepest nesting of sequences converted in either direction
pub const MAX_NESTING: usize = 256;

/// Marshal context for cell ↔ value conversions
///
/// Carries the limb orientation of the arena it converts for.
#[derive(Debug)]
pub(crate) struct MarshalContext {
    order: LimbOrder,
}

impl MarshalContext {
    /// Context for the thread's live arena
    pub(crate) fn new() -> Result<Self, RuntimeError> {
        Ok(Self::with_order(arena::limb_order()?))
    }

    pub(crate) fn with_order(order: LimbOrder) -> Self {
        Self { order }
    }

    /// Decode a cell into a host value
    ///
    /// # Safety
    ///
    /// `x` must point to a live cell of the current arena.
    pub(crate) unsafe fn to_host(&self, x: Gen) -> Result<Value, MarshalError> {
        self.decode(x, 0)
    }

    unsafe fn decode(&self, x: Gen, depth: usize) -> Result<Value, MarshalError> {
        let tag = match x.tag() {
            Some(tag) if tag.is_decodable() => tag,
            _ => return Err(MarshalError::unsupported(x.code())),
        };
        match tag {
            Tag::Int => Ok(Value::Integer(decode_integer(x, self.order))),
            Tag::Vec | Tag::Col | Tag::Mat | Tag::IntMod | Tag::PolMod => {
                self.components(x, 1, depth)
            }
            Tag::Pol => self.components(x, 2, depth),
            Tag::VecSmall => Ok(Value::Sequence(
                x.words(1, x.lg())
                    .iter()
                    .map(|word| Value::integer(*word as i64))
                    .collect(),
            )),
            Tag::Str => Ok(Value::Text(x.str_bytes().into())),
            Tag::Frac => self.fraction(x, depth),
            Tag::FfElt | Tag::Padic | Tag::Quad | Tag::Ser | Tag::RFrac => {
                Err(MarshalError::unsupported(tag.code()))
            }
        }
    }

    unsafe fn components(&self, x: Gen, start: usize, depth: usize) -> Result<Value, MarshalError> {
        if depth >= MAX_NESTING {
            return Err(MarshalError::TooDeep { limit: MAX_NESTING });
        }
        let elements = (start..x.lg())
            .map(|i| self.decode(x.gel(i), depth + 1))
            .collect::<Result<ValueArray, _>>()?;
        Ok(Value::Sequence(elements))
    }

    unsafe fn fraction(&self, x: Gen, depth: usize) -> Result<Value, MarshalError> {
        if depth >= MAX_NESTING {
            return Err(MarshalError::TooDeep { limit: MAX_NESTING });
        }
        let numerator = self.decode(x.gel(1), depth + 1)?;
        let denominator = self.decode(x.gel(2), depth + 1)?;
        let malformed = |reason: &str| MarshalError::Malformed {
            tag: Tag::Frac,
            reason: reason.to_string(),
        };
        match (numerator, denominator) {
            (numerator, Value::Integer(d)) if d.is_one() => Ok(numerator),
            (Value::Integer(n), Value::Integer(d)) => {
                Value::rational(n, d).ok_or_else(|| malformed("zero denominator"))
            }
            _ => Err(malformed("components are not integers")),
        }
    }

    /// Build cells for a host value
    ///
    /// A handle passes through as its own cell; every other shape is copied
    /// onto the arena.
    pub(crate) fn to_foreign(&self, value: &Value) -> Result<Gen, RuntimeError> {
        match value {
            Value::Handle(handle) => handle.raw(),
            _ => Ok(self.encode(value, 0)?),
        }
    }

    fn encode(&self, value: &Value, depth: usize) -> Result<Gen, MarshalError> {
        match value {
            Value::Integer(n) => Ok(self.integer(n)),
            Value::Sequence(_) if depth >= MAX_NESTING => {
                Err(MarshalError::TooDeep { limit: MAX_NESTING })
            }
            Value::Sequence(elements) => {
                let cells = elements
                    .iter()
                    .map(|element| match element {
                        Value::Integer(_) | Value::Sequence(_) => self.encode(element, depth + 1),
                        other => Err(MarshalError::not_convertible(other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let vec = cgetg(cells.len() + 1, Tag::Vec);
                // SAFETY: one slot per element after the header
                unsafe {
                    for (i, cell) in cells.iter().enumerate() {
                        vec.set_gel(i + 1, *cell);
                    }
                }
                Ok(vec)
            }
            Value::Permutation(perm) => Ok(self.permutation(perm)),
            other => Err(MarshalError::not_convertible(other)),
        }
    }

    fn integer(&self, n: &BigInt) -> Gen {
        encode_integer(n, self.order)
    }

    fn permutation(&self, perm: &Permutation) -> Gen {
        let images = perm.images();
        let cell = cgetg(images.len() + 1, Tag::VecSmall);
        // SAFETY: one word per image after the header
        unsafe {
            for (i, image) in images.iter().enumerate() {
                cell.set_word(i + 1, *image as u64 + 1);
            }
        }
        cell
    }

    /// Polynomial cell from integer coefficients, lowest degree first
    ///
    /// The result is normalised: trailing zero coefficients are dropped and an
    /// empty or all-zero list gives the zero polynomial.
    pub(crate) fn coeffs_to_pol(&self, coeffs: &[Value]) -> Result<Gen, MarshalError> {
        let cells = coeffs
            .iter()
            .map(|coeff| match coeff {
                Value::Integer(n) => Ok(self.integer(n)),
                other => Err(MarshalError::not_convertible(other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(mkpol(&cells))
    }
}

/// Convert a host value into a new handle
pub fn to_handle(value: &Value) -> Result<ForeignHandle, RuntimeError> {
    if let Value::Handle(handle) = value {
        handle.raw()?;
        return Ok(handle.clone());
    }
    guard(|| {
        let cell = MarshalContext::new()?.to_foreign(value)?;
        trace!(type_name = value.type_name(), "marshalled value onto the arena");
        ForeignHandle::wrap(cell)
    })
}

/// Convert an integer into a new handle; any other value is rejected
pub fn int_to_handle(value: &Value) -> Result<ForeignHandle, RuntimeError> {
    match value {
        Value::Integer(_) => to_handle(value),
        other => Err(MarshalError::not_convertible(other).into()),
    }
}

/// Decode the value behind a handle
pub fn to_host(handle: &ForeignHandle) -> Result<Value, RuntimeError> {
    let raw = handle.raw()?;
    guard(|| {
        let ctx = MarshalContext::new()?;
        // SAFETY: raw comes from a handle of the live generation
        Ok(unsafe { ctx.to_host(raw) }?)
    })
}

/// Convert to the foreign side and straight back
///
/// The cells built on the way are reclaimed before returning.
///
/// # Example
///
/// ```
/// # use paribridge_runtime::ffi::marshal;
/// # use paribridge_runtime::value::Value;
/// # use paribridge_runtime::arena;
/// arena::initialize(1 << 16, 1 << 20).unwrap();
///
/// let value = Value::sequence(vec![Value::integer(1), Value::integer(-2)]);
/// assert_eq!(marshal::roundtrip(&value).unwrap(), value);
/// # arena::close().unwrap();
/// ```
pub fn roundtrip(value: &Value) -> Result<Value, RuntimeError> {
    scratch(|| {
        let ctx = MarshalContext::new()?;
        let cell = ctx.to_foreign(value)?;
        // SAFETY: the cell was just built on the live arena
        Ok(unsafe { ctx.to_host(cell) }?)
    })
}

/// Build a normalised univariate polynomial from a coefficient list
pub fn unipoly(coeffs: &Value) -> Result<ForeignHandle, RuntimeError> {
    let coeffs = match coeffs {
        Value::Sequence(coeffs) => coeffs,
        other => return Err(MarshalError::not_convertible(other).into()),
    };
    guard(|| {
        let ctx = MarshalContext::new()?;
        let pol = ctx.coeffs_to_pol(coeffs.as_slice())?;
        ForeignHandle::wrap(pol)
    })
}

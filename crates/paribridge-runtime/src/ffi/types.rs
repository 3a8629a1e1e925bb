//! FFI type system - foreign shapes and call signatures at the arena boundary
//!
//! Defines:
//! - `Tag`: the foreign library's type codes for tagged cells
//! - `HandleKind`: the discriminant stored in every `ForeignHandle`
//! - `Arity`: the fixed family of call shapes (0 to 5 arguments)
//! - `GenFn0`..`GenFn5` / `NativeEntry`: typed native entry points
//!
//! Type codes follow the foreign library:
//! - Tag::Int → 1, Tag::Frac → 4, Tag::Pol → 10
//! - Tag::Vec → 17, Tag::Col → 18, Tag::Mat → 19
//! - Tag::Str → 21, Tag::VecSmall → 22

use crate::arena::Gen;
use crate::ffi::caller::CallError;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::fmt;

/// Foreign type code of a tagged cell
///
/// Every variant has a name in the foreign library. Codes with no variant here
/// (reals, complex numbers, closures, ...) are reported by their number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Arbitrary-precision integer
    Int = 1,
    /// Integer modulo an integer: `[modulus, value]`
    IntMod = 3,
    /// Fraction of two integers: `[numerator, denominator]`
    Frac = 4,
    /// Finite field element (unsupported)
    FfElt = 5,
    /// p-adic number (unsupported)
    Padic = 7,
    /// Quadratic number (unsupported)
    Quad = 8,
    /// Polynomial modulo a polynomial: `[modulus, value]`
    PolMod = 9,
    /// Dense polynomial, coefficients from offset 2, lowest degree first
    Pol = 10,
    /// Power series (unsupported)
    Ser = 11,
    /// Rational function (unsupported)
    RFrac = 13,
    /// Row vector
    Vec = 17,
    /// Column vector
    Col = 18,
    /// Matrix (vector of columns)
    Mat = 19,
    /// NUL-terminated byte string
    Str = 21,
    /// Vector of raw machine words
    VecSmall = 22,
}

impl Tag {
    /// All named tags, in code order
    pub const ALL: [Tag; 15] = [
        Tag::Int,
        Tag::IntMod,
        Tag::Frac,
        Tag::FfElt,
        Tag::Padic,
        Tag::Quad,
        Tag::PolMod,
        Tag::Pol,
        Tag::Ser,
        Tag::RFrac,
        Tag::Vec,
        Tag::Col,
        Tag::Mat,
        Tag::Str,
        Tag::VecSmall,
    ];

    /// Look up a tag by its numeric code
    ///
    /// # Examples
    ///
    /// ```
    /// # use paribridge_runtime::ffi::Tag;
    /// assert_eq!(Tag::from_code(10), Some(Tag::Pol));
    /// assert_eq!(Tag::from_code(2), None);
    /// ```
    pub fn from_code(code: u8) -> Option<Tag> {
        Tag::ALL.iter().copied().find(|tag| tag.code() == code)
    }

    /// Numeric code stored in the cell header
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name used by the foreign library for this type
    pub fn name(self) -> &'static str {
        match self {
            Tag::Int => "t_INT",
            Tag::IntMod => "t_INTMOD",
            Tag::Frac => "t_FRAC",
            Tag::FfElt => "t_FFELT",
            Tag::Padic => "t_PADIC",
            Tag::Quad => "t_QUAD",
            Tag::PolMod => "t_POLMOD",
            Tag::Pol => "t_POL",
            Tag::Ser => "t_SER",
            Tag::RFrac => "t_RFRAC",
            Tag::Vec => "t_VEC",
            Tag::Col => "t_COL",
            Tag::Mat => "t_MAT",
            Tag::Str => "t_STR",
            Tag::VecSmall => "t_VECSMALL",
        }
    }

    /// Whether the marshaller can decode this shape into a host value
    pub fn is_decodable(self) -> bool {
        !matches!(
            self,
            Tag::FfElt | Tag::Padic | Tag::Quad | Tag::Ser | Tag::RFrac
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discriminant carried by a `ForeignHandle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandleKind {
    /// Generic foreign value
    #[default]
    Gen,
}

impl HandleKind {
    /// Numeric discriminant exposed to the host
    pub fn code(self) -> u8 {
        match self {
            HandleKind::Gen => 0,
        }
    }
}

/// Number of foreign arguments a native entry point takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arity {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
}

impl Arity {
    /// Largest supported arity
    pub const MAX: usize = 5;

    /// Argument count for this arity
    pub fn count(self) -> usize {
        match self {
            Arity::Zero => 0,
            Arity::One => 1,
            Arity::Two => 2,
            Arity::Three => 3,
            Arity::Four => 4,
            Arity::Five => 5,
        }
    }
}

impl TryFrom<usize> for Arity {
    type Error = CallError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        match count {
            0 => Ok(Arity::Zero),
            1 => Ok(Arity::One),
            2 => Ok(Arity::Two),
            3 => Ok(Arity::Three),
            4 => Ok(Arity::Four),
            5 => Ok(Arity::Five),
            other => Err(CallError::UnsupportedArity(other.into())),
        }
    }
}

impl TryFrom<&BigInt> for Arity {
    type Error = CallError;

    fn try_from(count: &BigInt) -> Result<Self, Self::Error> {
        match count.to_usize() {
            Some(count) => Arity::try_from(count),
            None => Err(CallError::UnsupportedArity(count.clone())),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

pub type GenFn0 = unsafe extern "C-unwind" fn() -> Gen;
pub type GenFn1 = unsafe extern "C-unwind" fn(Gen) -> Gen;
pub type GenFn2 = unsafe extern "C-unwind" fn(Gen, Gen) -> Gen;
pub type GenFn3 = unsafe extern "C-unwind" fn(Gen, Gen, Gen) -> Gen;
pub type GenFn4 = unsafe extern "C-unwind" fn(Gen, Gen, Gen, Gen) -> Gen;
pub type GenFn5 = unsafe extern "C-unwind" fn(Gen, Gen, Gen, Gen, Gen) -> Gen;

/// A native entry point typed by its arity
#[derive(Clone, Copy)]
pub enum NativeEntry {
    A0(GenFn0),
    A1(GenFn1),
    A2(GenFn2),
    A3(GenFn3),
    A4(GenFn4),
    A5(GenFn5),
}

impl NativeEntry {
    /// Reinterpret a raw symbol address as an entry point of the given arity
    ///
    /// # Safety
    ///
    /// `address` must be the address of a function taking exactly
    /// `arity.count()` foreign values and returning one. Nothing checks this:
    /// a mis-declared arity is undefined behaviour.
    pub unsafe fn from_address(address: *const (), arity: Arity) -> Self {
        match arity {
            Arity::Zero => NativeEntry::A0(std::mem::transmute::<*const (), GenFn0>(address)),
            Arity::One => NativeEntry::A1(std::mem::transmute::<*const (), GenFn1>(address)),
            Arity::Two => NativeEntry::A2(std::mem::transmute::<*const (), GenFn2>(address)),
            Arity::Three => NativeEntry::A3(std::mem::transmute::<*const (), GenFn3>(address)),
            Arity::Four => NativeEntry::A4(std::mem::transmute::<*const (), GenFn4>(address)),
            Arity::Five => NativeEntry::A5(std::mem::transmute::<*const (), GenFn5>(address)),
        }
    }

    /// Arity of this entry point
    pub fn arity(&self) -> Arity {
        match self {
            NativeEntry::A0(_) => Arity::Zero,
            NativeEntry::A1(_) => Arity::One,
            NativeEntry::A2(_) => Arity::Two,
            NativeEntry::A3(_) => Arity::Three,
            NativeEntry::A4(_) => Arity::Four,
            NativeEntry::A5(_) => Arity::Five,
        }
    }

    /// Call the entry point
    ///
    /// # Safety
    ///
    /// `args.len()` must equal the arity and every argument must point into the
    /// live arena. The callee may unwind with a foreign error.
    pub(crate) unsafe fn invoke(&self, args: &[Gen]) -> Gen {
        match *self {
            NativeEntry::A0(f) => f(),
            NativeEntry::A1(f) => f(args[0]),
            NativeEntry::A2(f) => f(args[0], args[1]),
            NativeEntry::A3(f) => f(args[0], args[1], args[2]),
            NativeEntry::A4(f) => f(args[0], args[1], args[2], args[3]),
            NativeEntry::A5(f) => f(args[0], args[1], args[2], args[3], args[4]),
        }
    }
}

impl fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeEntry(arity {})", self.arity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_codes_roundtrip() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_code(tag.code()), Some(tag));
        }
    }

    #[test]
    fn test_unknown_codes() {
        // reals, complex numbers, closures
        assert_eq!(Tag::from_code(2), None);
        assert_eq!(Tag::from_code(6), None);
        assert_eq!(Tag::from_code(23), None);
        assert_eq!(Tag::from_code(0), None);
    }

    #[test]
    fn test_decodable_shapes() {
        assert!(Tag::Int.is_decodable());
        assert!(Tag::Mat.is_decodable());
        assert!(!Tag::Ser.is_decodable());
        assert!(!Tag::Padic.is_decodable());
        assert!(!Tag::Quad.is_decodable());
        assert!(!Tag::RFrac.is_decodable());
        assert!(!Tag::FfElt.is_decodable());
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(Tag::VecSmall.to_string(), "t_VECSMALL");
        assert_eq!(Tag::Frac.name(), "t_FRAC");
    }

    #[test]
    fn test_arity_from_count() {
        assert_eq!(Arity::try_from(0).unwrap(), Arity::Zero);
        assert_eq!(Arity::try_from(5).unwrap(), Arity::Five);
        assert_eq!(
            Arity::try_from(6),
            Err(CallError::UnsupportedArity(6.into()))
        );
        assert_eq!(Arity::try_from(&BigInt::from(3)), Ok(Arity::Three));
        assert_eq!(
            Arity::try_from(&BigInt::from(-1)),
            Err(CallError::UnsupportedArity((-1).into()))
        );
    }

    #[test]
    fn test_handle_kind_code() {
        assert_eq!(HandleKind::Gen.code(), 0);
        assert_eq!(HandleKind::default(), HandleKind::Gen);
    }
}

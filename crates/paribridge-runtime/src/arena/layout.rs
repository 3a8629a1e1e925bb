//! Cell layout of the foreign arena
//!
//! Every foreign value is a run of 64-bit words. Word 0 is the code word:
//! the type code lives in the top 7 bits and the cell length (in words,
//! header included) in the low 56 bits. The second word depends on the type:
//!
//! - integers: sign in the top 2 bits, effective length in the low bits,
//!   limbs from word 2 onwards
//! - polynomials: sign in the top 2 bits, variable number below it,
//!   coefficients from word 2 onwards
//! - containers: pointers to component cells from word 1 onwards
//! - strings: NUL-terminated bytes packed from word 1 onwards
//! - small vectors: raw signed words from word 1 onwards

use crate::ffi::types::Tag;
use std::fmt;

/// One arena word
pub type Word = u64;

pub(crate) const TYPSHIFT: u32 = 57;
pub(crate) const LGBITS: Word = (1 << 56) - 1;
pub(crate) const SIGNSHIFT: u32 = 62;
pub(crate) const VARNSHIFT: u32 = 48;
pub(crate) const VARNBITS: Word = 0x3FFF << VARNSHIFT;

/// Bytes per arena word
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

pub(crate) fn evaltyp(code: u8) -> Word {
    (code as Word) << TYPSHIFT
}

pub(crate) fn evallg(len: usize) -> Word {
    len as Word & LGBITS
}

pub(crate) fn evalsigne(sign: i8) -> Word {
    ((sign as i64) as Word) << SIGNSHIFT
}

pub(crate) fn evallgefint(len: usize) -> Word {
    len as Word & LGBITS
}

pub(crate) fn evalvarn(varn: u16) -> Word {
    ((varn as Word) << VARNSHIFT) & VARNBITS
}

/// Limb orientation of integer cells
///
/// The foreign library can be built to store integer limbs either way round.
/// Conversions always produce least-significant-first digits on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LimbOrder {
    /// Limb 0 at word 2 (the supported native orientation)
    #[default]
    LeastSignificantFirst,
    /// Most significant limb at word 2
    MostSignificantFirst,
}

impl LimbOrder {
    /// Word index of the `i`-th least significant limb in a cell of
    /// effective length `len`
    pub(crate) fn limb_index(self, i: usize, len: usize) -> usize {
        match self {
            LimbOrder::LeastSignificantFirst => 2 + i,
            LimbOrder::MostSignificantFirst => len - 1 - i,
        }
    }
}

impl fmt::Display for LimbOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimbOrder::LeastSignificantFirst => write!(f, "lsw"),
            LimbOrder::MostSignificantFirst => write!(f, "msw"),
        }
    }
}

/// Raw pointer to a foreign cell
///
/// A `Gen` is only meaningful while the arena generation that produced it is
/// live. Reading through it is therefore `unsafe`; the safe way to hold on to
/// a foreign value is a `ForeignHandle`, which checks the generation first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Gen(*mut Word);

impl Gen {
    pub(crate) fn from_ptr(ptr: *mut Word) -> Self {
        Gen(ptr)
    }

    /// The null cell pointer (never produced by the arena)
    pub fn null() -> Self {
        Gen(std::ptr::null_mut())
    }

    /// Address of the cell
    pub fn addr(self) -> usize {
        self.0 as usize
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    pub(crate) fn as_ptr(self) -> *mut Word {
        self.0
    }

    pub(crate) unsafe fn word(self, i: usize) -> Word {
        *self.0.add(i)
    }

    pub(crate) unsafe fn set_word(self, i: usize, value: Word) {
        *self.0.add(i) = value;
    }

    /// Numeric type code from the code word
    pub(crate) unsafe fn code(self) -> u8 {
        (self.word(0) >> TYPSHIFT) as u8
    }

    pub(crate) unsafe fn tag(self) -> Option<Tag> {
        Tag::from_code(self.code())
    }

    /// Cell length in words, header included
    pub(crate) unsafe fn lg(self) -> usize {
        (self.word(0) & LGBITS) as usize
    }

    /// Shrink or grow the recorded length in place
    pub(crate) unsafe fn set_lg(self, len: usize) {
        let code = self.word(0) & !LGBITS;
        self.set_word(0, code | evallg(len));
    }

    /// Sign of an integer or polynomial: -1, 0 or 1
    pub(crate) unsafe fn signe(self) -> i8 {
        ((self.word(1) as i64) >> SIGNSHIFT) as i8
    }

    pub(crate) unsafe fn set_signe(self, sign: i8) {
        let rest = self.word(1) & !(0b11 << SIGNSHIFT);
        self.set_word(1, rest | evalsigne(sign));
    }

    /// Effective length of an integer (header words included)
    pub(crate) unsafe fn lgefint(self) -> usize {
        (self.word(1) & LGBITS) as usize
    }

    pub(crate) unsafe fn varn(self) -> u16 {
        ((self.word(1) & VARNBITS) >> VARNSHIFT) as u16
    }

    /// Component `i` of a container cell
    pub(crate) unsafe fn gel(self, i: usize) -> Gen {
        Gen(self.word(i) as usize as *mut Word)
    }

    pub(crate) unsafe fn set_gel(self, i: usize, component: Gen) {
        self.set_word(i, component.addr() as Word);
    }

    /// Words `start..end` of the cell
    pub(crate) unsafe fn words<'a>(self, start: usize, end: usize) -> &'a [Word] {
        std::slice::from_raw_parts(self.0.add(start), end.saturating_sub(start))
    }

    /// Bytes of a string cell, up to (not including) the terminating NUL
    pub(crate) unsafe fn str_bytes<'a>(self) -> &'a [u8] {
        let capacity = self.lg().saturating_sub(1) * WORD_BYTES;
        let bytes = std::slice::from_raw_parts(self.0.add(1) as *const u8, capacity);
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(capacity);
        &bytes[..end]
    }
}

impl fmt::Debug for Gen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen({:#x})", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields_decode() {
        let mut cell: [Word; 4] = [0; 4];
        let g = Gen::from_ptr(cell.as_mut_ptr());
        unsafe {
            g.set_word(0, evaltyp(Tag::Int.code()) | evallg(4));
            g.set_word(1, evalsigne(-1) | evallgefint(4));
            assert_eq!(g.code(), 1);
            assert_eq!(g.tag(), Some(Tag::Int));
            assert_eq!(g.lg(), 4);
            assert_eq!(g.signe(), -1);
            assert_eq!(g.lgefint(), 4);

            g.set_signe(1);
            assert_eq!(g.signe(), 1);
            assert_eq!(g.lgefint(), 4);
        }
    }

    #[test]
    fn test_set_lg_keeps_type() {
        let mut cell: [Word; 5] = [0; 5];
        let g = Gen::from_ptr(cell.as_mut_ptr());
        unsafe {
            g.set_word(0, evaltyp(Tag::Pol.code()) | evallg(5));
            g.set_lg(3);
            assert_eq!(g.tag(), Some(Tag::Pol));
            assert_eq!(g.lg(), 3);
        }
    }

    #[test]
    fn test_polynomial_variable_and_sign_share_word() {
        let mut cell: [Word; 2] = [0; 2];
        let g = Gen::from_ptr(cell.as_mut_ptr());
        unsafe {
            g.set_word(1, evalsigne(1) | evalvarn(3));
            assert_eq!(g.signe(), 1);
            assert_eq!(g.varn(), 3);
        }
    }

    #[test]
    fn test_limb_index_orientation() {
        // cell of effective length 5 holds limbs at words 2, 3, 4
        assert_eq!(LimbOrder::LeastSignificantFirst.limb_index(0, 5), 2);
        assert_eq!(LimbOrder::LeastSignificantFirst.limb_index(2, 5), 4);
        assert_eq!(LimbOrder::MostSignificantFirst.limb_index(0, 5), 4);
        assert_eq!(LimbOrder::MostSignificantFirst.limb_index(2, 5), 2);
    }

    #[test]
    fn test_str_bytes_stops_at_nul() {
        let mut cell: [Word; 3] = [0; 3];
        let g = Gen::from_ptr(cell.as_mut_ptr());
        unsafe {
            g.set_word(0, evaltyp(Tag::Str.code()) | evallg(3));
            let payload = b"hello";
            std::ptr::copy_nonoverlapping(payload.as_ptr(), g.as_ptr().add(1) as *mut u8, 5);
            assert_eq!(g.str_bytes(), b"hello");
        }
    }
}

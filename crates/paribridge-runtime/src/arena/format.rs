//! Textual rendering of foreign cells
//!
//! Output follows the foreign library's own printer closely enough for
//! diagnostics: `2*x^2 - x`, `Mod(6, 7)`, `[1, 2]~`, `[1, 2; 3, 4]`.

use super::{Gen, LimbOrder};
use crate::ffi::marshal::decode_integer;
use crate::ffi::types::Tag;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use std::fmt::Write;

const VARIABLES: [&str; 4] = ["x", "y", "z", "t"];

/// Render a cell
///
/// # Safety
///
/// `x` must be null or point to a live cell of the current arena.
pub(crate) unsafe fn gen_to_string(x: Gen, order: LimbOrder) -> String {
    let mut out = String::new();
    write_gen(&mut out, x, order);
    out
}

unsafe fn write_gen(out: &mut String, x: Gen, order: LimbOrder) {
    if x.is_null() {
        out.push_str("NULL");
        return;
    }
    match x.tag() {
        Some(Tag::Int) => {
            let _ = write!(out, "{}", decode_integer(x, order));
        }
        Some(Tag::Frac) => {
            write_gen(out, x.gel(1), order);
            out.push('/');
            write_gen(out, x.gel(2), order);
        }
        Some(Tag::IntMod | Tag::PolMod) => {
            out.push_str("Mod(");
            write_gen(out, x.gel(2), order);
            out.push_str(", ");
            write_gen(out, x.gel(1), order);
            out.push(')');
        }
        Some(Tag::Pol) => write_pol(out, x, order),
        Some(Tag::Vec) => write_components(out, x, order),
        Some(Tag::Col) => {
            write_components(out, x, order);
            out.push('~');
        }
        Some(Tag::Mat) => write_mat(out, x, order),
        Some(Tag::Str) => {
            let _ = write!(out, "{:?}", String::from_utf8_lossy(x.str_bytes()));
        }
        Some(Tag::VecSmall) => {
            out.push_str("Vecsmall([");
            for (i, word) in x.words(1, x.lg()).iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}", *word as i64);
            }
            out.push_str("])");
        }
        Some(other) => {
            let _ = write!(out, "<{}>", other);
        }
        None => {
            let _ = write!(out, "<type {}>", x.code());
        }
    }
}

unsafe fn write_components(out: &mut String, x: Gen, order: LimbOrder) {
    out.push('[');
    for i in 1..x.lg() {
        if i > 1 {
            out.push_str(", ");
        }
        write_gen(out, x.gel(i), order);
    }
    out.push(']');
}

/// Matrices are stored by column and printed by row
unsafe fn write_mat(out: &mut String, x: Gen, order: LimbOrder) {
    let cols = x.lg().saturating_sub(1);
    let rows = if cols == 0 { 0 } else { x.gel(1).lg().saturating_sub(1) };
    if rows == 0 {
        out.push_str("[;]");
        return;
    }
    out.push('[');
    for r in 1..=rows {
        if r > 1 {
            out.push_str("; ");
        }
        for c in 1..=cols {
            if c > 1 {
                out.push_str(", ");
            }
            write_gen(out, x.gel(c).gel(r), order);
        }
    }
    out.push(']');
}

fn monomial(variable: &str, degree: usize) -> String {
    match degree {
        0 => String::new(),
        1 => variable.to_string(),
        d => format!("{}^{}", variable, d),
    }
}

unsafe fn write_pol(out: &mut String, x: Gen, order: LimbOrder) {
    let varn = x.varn() as usize;
    let variable = VARIABLES
        .get(varn)
        .map(|v| v.to_string())
        .unwrap_or_else(|| format!("v{}", varn));
    let mut first = true;
    for i in (2..x.lg()).rev() {
        let degree = i - 2;
        let coeff = x.gel(i);
        let term = monomial(&variable, degree);
        if coeff.tag() == Some(Tag::Int) {
            let value: BigInt = decode_integer(coeff, order);
            if value.is_zero() {
                continue;
            }
            let sign = if value.is_negative() { "-" } else { "+" };
            if first {
                if sign == "-" {
                    out.push('-');
                }
            } else {
                let _ = write!(out, " {} ", sign);
            }
            let magnitude = value.abs();
            match (magnitude.is_one(), term.is_empty()) {
                (true, false) => out.push_str(&term),
                (_, true) => {
                    let _ = write!(out, "{}", magnitude);
                }
                (false, false) => {
                    let _ = write!(out, "{}*{}", magnitude, term);
                }
            }
        } else {
            if !first {
                out.push_str(" + ");
            }
            out.push('(');
            write_gen(out, coeff, order);
            out.push(')');
            if !term.is_empty() {
                out.push('*');
                out.push_str(&term);
            }
        }
        first = false;
    }
    if first {
        out.push('0');
    }
}

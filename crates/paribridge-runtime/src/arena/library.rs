//! Entry points exported by the arena
//!
//! These behave like symbols of the foreign library: they take and return raw
//! cells, allocate on the arena, and report failures with [`pari_err`]. The
//! dispatcher finds them by name before falling back to dynamically loaded
//! symbols.
//!
//! Arithmetic covers integers, fractions, integer-coefficient polynomials and
//! component-wise vector sums. Anything else raises an "incorrect type" error.

use super::format;
use super::{alloc, cgetg, normalizepol, pol_header, stoi, strtogenstr};
use super::{pari_err, ForeignErrorKind, Gen, LimbOrder};
use crate::ffi::marshal::{decode_integer, encode_integer};
use crate::ffi::types::{NativeEntry, Tag};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// A named arena entry point
#[derive(Debug, Clone, Copy)]
pub struct Export {
    pub name: &'static str,
    pub entry: NativeEntry,
}

const fn export(name: &'static str, entry: NativeEntry) -> Export {
    Export { name, entry }
}

/// Every entry point the arena exports, by name
pub static EXPORTS: &[Export] = &[
    export("pari_version", NativeEntry::A0(pari_version)),
    export("gen_0", NativeEntry::A0(gen_0)),
    export("gen_1", NativeEntry::A0(gen_1)),
    export("gneg", NativeEntry::A1(gneg)),
    export("gabs", NativeEntry::A1(gabs)),
    export("gcopy", NativeEntry::A1(gcopy)),
    export("gsqr", NativeEntry::A1(gsqr)),
    export("gtrans", NativeEntry::A1(gtrans)),
    export("glength", NativeEntry::A1(glength)),
    export("normalizepol", NativeEntry::A1(normalizepol_export)),
    export("GENtostr", NativeEntry::A1(gentostr)),
    export("mkvec", NativeEntry::A1(mkvec)),
    export("gadd", NativeEntry::A2(gadd)),
    export("gsub", NativeEntry::A2(gsub)),
    export("gmul", NativeEntry::A2(gmul)),
    export("gdiv", NativeEntry::A2(gdiv)),
    export("addii", NativeEntry::A2(addii)),
    export("mulii", NativeEntry::A2(mulii)),
    export("gmodulo", NativeEntry::A2(gmodulo)),
    export("mkpolmod", NativeEntry::A2(mkpolmod)),
    export("mkvec2", NativeEntry::A2(mkvec2)),
    export("mkvec3", NativeEntry::A3(mkvec3)),
    export("mkvec4", NativeEntry::A4(mkvec4)),
    export("mkvec5", NativeEntry::A5(mkvec5)),
];

/// Find an exported entry point by name
pub fn lookup(name: &str) -> Option<&'static Export> {
    EXPORTS.iter().find(|export| export.name == name)
}

/// Version triple of the arena, taken from the crate version
pub fn version() -> (i64, i64, i64) {
    (
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    )
}

pub fn version_string() -> String {
    let (major, minor, patch) = version();
    format!("paribridge arena {}.{}.{}", major, minor, patch)
}

fn limb_order() -> LimbOrder {
    match super::limb_order() {
        Ok(order) => order,
        Err(_) => pari_err(ForeignErrorKind::Bug, "no arena on this thread"),
    }
}

/// Rational number with a positive denominator; integers have denominator 1
#[derive(Debug, Clone, PartialEq)]
struct Q {
    num: BigInt,
    den: BigInt,
}

impl Q {
    fn int(num: BigInt) -> Self {
        Q {
            num,
            den: BigInt::one(),
        }
    }

    fn new(num: BigInt, den: BigInt, routine: &str) -> Self {
        if den.is_zero() {
            pari_err(ForeignErrorKind::Inverse, format!("{}: division by zero", routine));
        }
        let gcd = num.gcd(&den);
        let (mut num, mut den) = (num / &gcd, den / &gcd);
        if den.is_negative() {
            num = -num;
            den = -den;
        }
        Q { num, den }
    }

    fn is_int(&self) -> bool {
        self.den.is_one()
    }

    fn add(&self, other: &Q, routine: &str) -> Q {
        Q::new(
            &self.num * &other.den + &other.num * &self.den,
            &self.den * &other.den,
            routine,
        )
    }

    fn mul(&self, other: &Q, routine: &str) -> Q {
        Q::new(&self.num * &other.num, &self.den * &other.den, routine)
    }

    fn neg(&self) -> Q {
        Q {
            num: -&self.num,
            den: self.den.clone(),
        }
    }

    fn inverse(&self, routine: &str) -> Q {
        Q::new(self.den.clone(), self.num.clone(), routine)
    }

    fn to_gen(&self, order: LimbOrder) -> Gen {
        if self.is_int() {
            return encode_integer(&self.num, order);
        }
        let num = encode_integer(&self.num, order);
        let den = encode_integer(&self.den, order);
        let frac = cgetg(3, Tag::Frac);
        // SAFETY: three-word container
        unsafe {
            frac.set_gel(1, num);
            frac.set_gel(2, den);
        }
        frac
    }
}

/// Arithmetic operand
enum Operand {
    Scalar(Q),
    /// Integer coefficients, lowest degree first
    Poly(Vec<BigInt>),
    /// Row or column vector of cells
    Vector(Tag, Vec<Gen>),
}

unsafe fn operand(x: Gen, order: LimbOrder, routine: &str) -> Operand {
    match x.tag() {
        Some(Tag::Int) => Operand::Scalar(Q::int(decode_integer(x, order))),
        Some(Tag::Frac) => Operand::Scalar(Q::new(
            integer_component(x.gel(1), order, routine),
            integer_component(x.gel(2), order, routine),
            routine,
        )),
        Some(Tag::Pol) => Operand::Poly(
            (2..x.lg())
                .map(|i| integer_component(x.gel(i), order, routine))
                .collect(),
        ),
        Some(tag @ (Tag::Vec | Tag::Col)) => {
            Operand::Vector(tag, (1..x.lg()).map(|i| x.gel(i)).collect())
        }
        _ => incorrect_type(routine, x),
    }
}

unsafe fn integer_component(x: Gen, order: LimbOrder, routine: &str) -> BigInt {
    if x.tag() != Some(Tag::Int) {
        incorrect_type(routine, x);
    }
    decode_integer(x, order)
}

unsafe fn incorrect_type(routine: &str, x: Gen) -> ! {
    let name = match x.tag() {
        Some(tag) => tag.name().to_string(),
        None => format!("type {}", x.code()),
    };
    pari_err(ForeignErrorKind::Type, format!("{}: {}", routine, name))
}

/// Polynomial cell from integer coefficients, normalised
pub(crate) fn mkpol(coeffs: &[Gen]) -> Gen {
    let pol = cgetg(coeffs.len() + 2, Tag::Pol);
    // SAFETY: the cell has room for the header and every coefficient
    unsafe {
        pol.set_word(1, pol_header(1));
        for (i, coeff) in coeffs.iter().enumerate() {
            pol.set_gel(i + 2, *coeff);
        }
        normalizepol(pol)
    }
}

fn poly_to_gen(coeffs: &[BigInt], order: LimbOrder) -> Gen {
    let cells: Vec<Gen> = coeffs.iter().map(|c| encode_integer(c, order)).collect();
    mkpol(&cells)
}

fn poly_add(a: &[BigInt], b: &[BigInt]) -> Vec<BigInt> {
    let zero = BigInt::zero();
    (0..a.len().max(b.len()))
        .map(|i| a.get(i).unwrap_or(&zero) + b.get(i).unwrap_or(&zero))
        .collect()
}

fn poly_mul(a: &[BigInt], b: &[BigInt]) -> Vec<BigInt> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut product = vec![BigInt::zero(); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    product
}

fn constant_poly(q: &Q, routine: &str) -> Vec<BigInt> {
    if !q.is_int() {
        pari_err(
            ForeignErrorKind::Type,
            format!("{}: t_FRAC with t_POL", routine),
        );
    }
    vec![q.num.clone()]
}

fn mkcontainer(tag: Tag, components: &[Gen]) -> Gen {
    let cell = cgetg(components.len() + 1, tag);
    // SAFETY: the cell has one slot per component after the header
    unsafe {
        for (i, component) in components.iter().enumerate() {
            cell.set_gel(i + 1, *component);
        }
    }
    cell
}

unsafe fn add_impl(x: Gen, y: Gen, negate_y: bool, routine: &str) -> Gen {
    let order = limb_order();
    match (operand(x, order, routine), operand(y, order, routine)) {
        (Operand::Scalar(a), Operand::Scalar(b)) => {
            let b = if negate_y { b.neg() } else { b };
            a.add(&b, routine).to_gen(order)
        }
        (Operand::Vector(ta, a), Operand::Vector(tb, b)) => {
            if ta != tb || a.len() != b.len() {
                pari_err(
                    ForeignErrorKind::Type,
                    format!("{}: vectors of different shape", routine),
                );
            }
            let sums: Vec<Gen> = a
                .iter()
                .zip(&b)
                .map(|(p, q)| add_impl(*p, *q, negate_y, routine))
                .collect();
            mkcontainer(ta, &sums)
        }
        (a, b) => {
            let a = as_poly(a, x, routine);
            let mut b = as_poly(b, y, routine);
            if negate_y {
                b.iter_mut().for_each(|c| *c = -&*c);
            }
            poly_to_gen(&poly_add(&a, &b), order)
        }
    }
}

unsafe fn as_poly(operand: Operand, x: Gen, routine: &str) -> Vec<BigInt> {
    match operand {
        Operand::Poly(coeffs) => coeffs,
        Operand::Scalar(q) => constant_poly(&q, routine),
        Operand::Vector(..) => incorrect_type(routine, x),
    }
}

unsafe fn mul_impl(x: Gen, y: Gen, routine: &str) -> Gen {
    let order = limb_order();
    match (operand(x, order, routine), operand(y, order, routine)) {
        (Operand::Scalar(a), Operand::Scalar(b)) => a.mul(&b, routine).to_gen(order),
        (Operand::Scalar(_), Operand::Vector(tag, v)) => {
            let products: Vec<Gen> = v.iter().map(|c| mul_impl(x, *c, routine)).collect();
            mkcontainer(tag, &products)
        }
        (Operand::Vector(tag, v), Operand::Scalar(_)) => {
            let products: Vec<Gen> = v.iter().map(|c| mul_impl(*c, y, routine)).collect();
            mkcontainer(tag, &products)
        }
        (a, b) => {
            let a = as_poly(a, x, routine);
            let b = as_poly(b, y, routine);
            poly_to_gen(&poly_mul(&a, &b), order)
        }
    }
}

unsafe fn neg_impl(x: Gen) -> Gen {
    let order = limb_order();
    match operand(x, order, "gneg") {
        Operand::Scalar(q) => q.neg().to_gen(order),
        Operand::Poly(coeffs) => {
            let negated: Vec<BigInt> = coeffs.iter().map(|c| -c).collect();
            poly_to_gen(&negated, order)
        }
        Operand::Vector(tag, v) => {
            let negated: Vec<Gen> = v.iter().map(|c| neg_impl(*c)).collect();
            mkcontainer(tag, &negated)
        }
    }
}

unsafe fn copy_impl(x: Gen) -> Gen {
    let len = x.lg();
    let copy = alloc(len);
    let first_component = match x.tag() {
        Some(Tag::Pol) => Some(2),
        Some(Tag::IntMod | Tag::Frac | Tag::PolMod | Tag::Vec | Tag::Col | Tag::Mat) => Some(1),
        _ => None,
    };
    match first_component {
        Some(start) => {
            for i in 0..start {
                copy.set_word(i, x.word(i));
            }
            for i in start..len {
                copy.set_gel(i, copy_impl(x.gel(i)));
            }
        }
        None => std::ptr::copy_nonoverlapping(x.as_ptr(), copy.as_ptr(), len),
    }
    copy
}

unsafe extern "C-unwind" fn pari_version() -> Gen {
    let (major, minor, patch) = version();
    mkcontainer(Tag::Vec, &[stoi(major), stoi(minor), stoi(patch)])
}

unsafe extern "C-unwind" fn gen_0() -> Gen {
    stoi(0)
}

unsafe extern "C-unwind" fn gen_1() -> Gen {
    stoi(1)
}

unsafe extern "C-unwind" fn gneg(x: Gen) -> Gen {
    neg_impl(x)
}

unsafe extern "C-unwind" fn gabs(x: Gen) -> Gen {
    let order = limb_order();
    match operand(x, order, "gabs") {
        Operand::Scalar(q) => Q {
            num: q.num.abs(),
            den: q.den,
        }
        .to_gen(order),
        _ => incorrect_type("gabs", x),
    }
}

unsafe extern "C-unwind" fn gcopy(x: Gen) -> Gen {
    copy_impl(x)
}

unsafe extern "C-unwind" fn gsqr(x: Gen) -> Gen {
    mul_impl(x, x, "gsqr")
}

unsafe extern "C-unwind" fn gtrans(x: Gen) -> Gen {
    match x.tag() {
        Some(tag @ (Tag::Vec | Tag::Col)) => {
            let components: Vec<Gen> = (1..x.lg()).map(|i| x.gel(i)).collect();
            let flipped = if tag == Tag::Vec { Tag::Col } else { Tag::Vec };
            mkcontainer(flipped, &components)
        }
        Some(Tag::Mat) => {
            let cols = x.lg() - 1;
            let rows = if cols == 0 { 0 } else { x.gel(1).lg() - 1 };
            let transposed: Vec<Gen> = (1..=rows)
                .map(|r| {
                    let row: Vec<Gen> = (1..=cols).map(|c| x.gel(c).gel(r)).collect();
                    mkcontainer(Tag::Col, &row)
                })
                .collect();
            mkcontainer(Tag::Mat, &transposed)
        }
        _ => incorrect_type("gtrans", x),
    }
}

unsafe extern "C-unwind" fn glength(x: Gen) -> Gen {
    let length = match x.tag() {
        Some(Tag::Int) => x.lgefint().saturating_sub(2),
        Some(Tag::Pol) => x.lg().saturating_sub(2),
        Some(Tag::Str) => x.str_bytes().len(),
        Some(Tag::Frac | Tag::IntMod | Tag::PolMod) => 2,
        _ => x.lg().saturating_sub(1),
    };
    stoi(length as i64)
}

unsafe extern "C-unwind" fn normalizepol_export(x: Gen) -> Gen {
    if x.tag() != Some(Tag::Pol) {
        incorrect_type("normalizepol", x);
    }
    normalizepol(x)
}

unsafe extern "C-unwind" fn gentostr(x: Gen) -> Gen {
    let text = format::gen_to_string(x, limb_order());
    strtogenstr(text.as_bytes())
}

unsafe extern "C-unwind" fn mkvec(x: Gen) -> Gen {
    mkcontainer(Tag::Vec, &[x])
}

unsafe extern "C-unwind" fn gadd(x: Gen, y: Gen) -> Gen {
    add_impl(x, y, false, "gadd")
}

unsafe extern "C-unwind" fn gsub(x: Gen, y: Gen) -> Gen {
    add_impl(x, y, true, "gsub")
}

unsafe extern "C-unwind" fn gmul(x: Gen, y: Gen) -> Gen {
    mul_impl(x, y, "gmul")
}

unsafe extern "C-unwind" fn gdiv(x: Gen, y: Gen) -> Gen {
    let order = limb_order();
    match (operand(x, order, "gdiv"), operand(y, order, "gdiv")) {
        (Operand::Scalar(a), Operand::Scalar(b)) => {
            if b.num.is_zero() {
                pari_err(ForeignErrorKind::Inverse, "gdiv: division by zero");
            }
            a.mul(&b.inverse("gdiv"), "gdiv").to_gen(order)
        }
        (Operand::Scalar(_), _) => incorrect_type("gdiv", y),
        _ => incorrect_type("gdiv", x),
    }
}

unsafe extern "C-unwind" fn addii(x: Gen, y: Gen) -> Gen {
    let order = limb_order();
    let sum = integer_component(x, order, "addii") + integer_component(y, order, "addii");
    encode_integer(&sum, order)
}

unsafe extern "C-unwind" fn mulii(x: Gen, y: Gen) -> Gen {
    let order = limb_order();
    let product = integer_component(x, order, "mulii") * integer_component(y, order, "mulii");
    encode_integer(&product, order)
}

unsafe extern "C-unwind" fn gmodulo(x: Gen, y: Gen) -> Gen {
    let order = limb_order();
    let value = integer_component(x, order, "gmodulo");
    let modulus = integer_component(y, order, "gmodulo").abs();
    if modulus.is_zero() {
        pari_err(ForeignErrorKind::Domain, "gmodulo: zero modulus");
    }
    let residue = value.mod_floor(&modulus);
    mkcontainer(
        Tag::IntMod,
        &[encode_integer(&modulus, order), encode_integer(&residue, order)],
    )
}

unsafe extern "C-unwind" fn mkpolmod(x: Gen, y: Gen) -> Gen {
    mkcontainer(Tag::PolMod, &[y, x])
}

unsafe extern "C-unwind" fn mkvec2(a: Gen, b: Gen) -> Gen {
    mkcontainer(Tag::Vec, &[a, b])
}

unsafe extern "C-unwind" fn mkvec3(a: Gen, b: Gen, c: Gen) -> Gen {
    mkcontainer(Tag::Vec, &[a, b, c])
}

unsafe extern "C-unwind" fn mkvec4(a: Gen, b: Gen, c: Gen, d: Gen) -> Gen {
    mkcontainer(Tag::Vec, &[a, b, c, d])
}

unsafe extern "C-unwind" fn mkvec5(a: Gen, b: Gen, c: Gen, d: Gen, e: Gen) -> Gen {
    mkcontainer(Tag::Vec, &[a, b, c, d, e])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{self, catch, itos};
    use crate::ffi::types::Arity;

    struct Scoped;

    impl Scoped {
        fn open() -> Self {
            arena::initialize(1 << 16, 1 << 20).unwrap();
            Scoped
        }
    }

    impl Drop for Scoped {
        fn drop(&mut self) {
            let _ = arena::close();
        }
    }

    fn call(name: &str, args: &[Gen]) -> Gen {
        let export = lookup(name).unwrap();
        unsafe { export.entry.invoke(args) }
    }

    #[test]
    fn test_export_names_are_unique() {
        for (i, a) in EXPORTS.iter().enumerate() {
            assert!(EXPORTS[i + 1..].iter().all(|b| b.name != a.name), "{}", a.name);
        }
    }

    #[test]
    fn test_lookup_reports_arity() {
        assert_eq!(lookup("gmul").unwrap().entry.arity(), Arity::Two);
        assert_eq!(lookup("mkvec5").unwrap().entry.arity(), Arity::Five);
        assert!(lookup("factorint").is_none());
    }

    #[test]
    fn test_gmul_integers() {
        let _arena = Scoped::open();
        let product = call("gmul", &[stoi(12), stoi(34)]);
        assert_eq!(unsafe { itos(product) }, 408);
    }

    #[test]
    fn test_gdiv_produces_reduced_fraction() {
        let _arena = Scoped::open();
        let quotient = call("gdiv", &[stoi(6), stoi(-4)]);
        let text = unsafe { format::gen_to_string(quotient, LimbOrder::default()) };
        assert_eq!(text, "-3/2");
    }

    #[test]
    fn test_gdiv_by_zero_raises_inverse() {
        let _arena = Scoped::open();
        let (one, zero) = (stoi(1), stoi(0));
        let error = catch(|| call("gdiv", &[one, zero])).unwrap_err();
        assert_eq!(error.kind, ForeignErrorKind::Inverse);
    }

    #[test]
    fn test_gadd_fraction_back_to_integer() {
        let _arena = Scoped::open();
        let half = call("gdiv", &[stoi(1), stoi(2)]);
        let sum = call("gadd", &[half, half]);
        assert_eq!(unsafe { sum.tag() }, Some(Tag::Int));
        assert_eq!(unsafe { itos(sum) }, 1);
    }

    #[test]
    fn test_polynomial_product() {
        let _arena = Scoped::open();
        // (x + 1) * (x - 1) = x^2 - 1
        let p = mkpol(&[stoi(1), stoi(1)]);
        let q = mkpol(&[stoi(-1), stoi(1)]);
        let product = call("gmul", &[p, q]);
        let text = unsafe { format::gen_to_string(product, LimbOrder::default()) };
        assert_eq!(text, "x^2 - 1");
    }

    #[test]
    fn test_gsub_cancels_polynomial() {
        let _arena = Scoped::open();
        let p = mkpol(&[stoi(3), stoi(2)]);
        let zero = call("gsub", &[p, p]);
        unsafe {
            assert_eq!(zero.lg(), 2);
            assert_eq!(zero.signe(), 0);
        }
    }

    #[test]
    fn test_gmul_rejects_strings() {
        let _arena = Scoped::open();
        let text = strtogenstr(b"abc");
        let error = catch(|| call("gmul", &[text, stoi(2)])).unwrap_err();
        assert_eq!(error.kind, ForeignErrorKind::Type);
        assert_eq!(error.context, "gmul: t_STR");
    }

    #[test]
    fn test_gmodulo_reduces() {
        let _arena = Scoped::open();
        let m = call("gmodulo", &[stoi(-1), stoi(7)]);
        let text = unsafe { format::gen_to_string(m, LimbOrder::default()) };
        assert_eq!(text, "Mod(6, 7)");
    }

    #[test]
    fn test_gtrans_matrix() {
        let _arena = Scoped::open();
        let c1 = mkcontainer(Tag::Col, &[stoi(1), stoi(3)]);
        let c2 = mkcontainer(Tag::Col, &[stoi(2), stoi(4)]);
        let m = mkcontainer(Tag::Mat, &[c1, c2]);
        let t = call("gtrans", &[m]);
        let text = unsafe { format::gen_to_string(t, LimbOrder::default()) };
        assert_eq!(text, "[1, 3; 2, 4]");
    }

    #[test]
    fn test_gcopy_is_deep() {
        let _arena = Scoped::open();
        let v = mkcontainer(Tag::Vec, &[stoi(5)]);
        let copy = call("gcopy", &[v]);
        unsafe {
            assert_ne!(copy.addr(), v.addr());
            assert_ne!(copy.gel(1).addr(), v.gel(1).addr());
            assert_eq!(itos(copy.gel(1)), 5);
        }
    }

    #[test]
    fn test_glength() {
        let _arena = Scoped::open();
        let v = call("mkvec3", &[stoi(1), stoi(2), stoi(3)]);
        assert_eq!(unsafe { itos(call("glength", &[v])) }, 3);
        let s = strtogenstr(b"hello");
        assert_eq!(unsafe { itos(call("glength", &[s])) }, 5);
    }

    #[test]
    fn test_version_vector() {
        let _arena = Scoped::open();
        let v = call("pari_version", &[]);
        unsafe {
            assert_eq!(v.tag(), Some(Tag::Vec));
            assert_eq!(v.lg(), 4);
        }
        assert!(version_string().starts_with("paribridge arena "));
    }
}

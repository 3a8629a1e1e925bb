//! Dynamic invocation of foreign entry points
//!
//! Every foreign entry point takes some number of cells and returns one, so a
//! call needs only the arity to pick a function-pointer type. Arities 0 to 5
//! are supported; `call0`..`call5` cover them directly and [`bind`] resolves
//! a name once for repeated calls.
//!
//! A call always:
//! 1. resolves the name (no foreign code runs if that fails);
//! 2. checks the argument count against the arity;
//! 3. unwraps every handle, rejecting stale ones;
//! 4. runs the entry point inside the error barrier;
//! 5. wraps the result in a fresh handle.

use crate::arena::barrier::guard;
use crate::arena::{pari_err, ForeignErrorKind, Gen};
use crate::ffi::handle::ForeignHandle;
use crate::ffi::loader::{SymbolOrigin, SymbolResolver};
use crate::ffi::marshal;
use crate::ffi::types::{Arity, NativeEntry};
use crate::value::{RuntimeError, Value};
use num_bigint::BigInt;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Call errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No export, library or process symbol has this name
    #[error("function not found: {name}")]
    FunctionNotFound { name: String },
    /// Arity outside 0..=5
    #[error("unsupported arity {0} (at most {max} arguments)", max = Arity::MAX)]
    UnsupportedArity(BigInt),
    /// Wrong number of arguments for a resolved function
    #[error("{name} takes {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// A foreign entry point resolved by name
///
/// Cloning is cheap; the loaded library (if any) stays alive as long as one
/// clone does.
#[derive(Clone)]
pub struct ForeignFunction {
    name: Arc<str>,
    entry: NativeEntry,
    origin: SymbolOrigin,
}

impl ForeignFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.entry.arity()
    }

    pub fn origin(&self) -> &SymbolOrigin {
        &self.origin
    }

    /// Call with handles
    ///
    /// The number of handles must equal the arity; nothing is padded or
    /// truncated.
    pub fn call(&self, args: &[&ForeignHandle]) -> Result<ForeignHandle, RuntimeError> {
        let expected = self.arity().count();
        if args.len() != expected {
            return Err(CallError::ArityMismatch {
                name: self.name.to_string(),
                expected,
                got: args.len(),
            }
            .into());
        }
        let raw = args
            .iter()
            .map(|handle| handle.raw())
            .collect::<Result<Vec<Gen>, _>>()?;
        trace!(name = %self.name, arity = expected, "invoking foreign function");
        guard(|| {
            // SAFETY: the arity matches and every argument belongs to the live arena
            let result = unsafe { self.entry.invoke(&raw) };
            if result.is_null() {
                pari_err(
                    ForeignErrorKind::Bug,
                    format!("{} returned a null cell", self.name),
                );
            }
            ForeignHandle::wrap(result)
        })
    }

    /// Call with host values, converting each argument to a handle first
    pub fn call_values(&self, args: &[Value]) -> Result<ForeignHandle, RuntimeError> {
        let expected = self.arity().count();
        if args.len() != expected {
            return Err(CallError::ArityMismatch {
                name: self.name.to_string(),
                expected,
                got: args.len(),
            }
            .into());
        }
        let handles = args
            .iter()
            .map(marshal::to_handle)
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&ForeignHandle> = handles.iter().collect();
        self.call(&refs)
    }
}

impl PartialEq for ForeignFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity() == other.arity()
    }
}

impl fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignFunction")
            .field("name", &self.name)
            .field("arity", &self.arity().count())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Resolve `name` once as a function of `arity` arguments
pub fn bind(
    resolver: &mut SymbolResolver,
    name: &str,
    arity: usize,
) -> Result<ForeignFunction, RuntimeError> {
    let arity = Arity::try_from(arity)?;
    let symbol = resolver.resolve(name, arity)?;
    Ok(ForeignFunction {
        name: Arc::from(name),
        entry: symbol.entry,
        origin: symbol.origin,
    })
}

fn call_n(
    resolver: &mut SymbolResolver,
    name: &str,
    args: &[&ForeignHandle],
) -> Result<ForeignHandle, RuntimeError> {
    bind(resolver, name, args.len())?.call(args)
}

pub fn call0(resolver: &mut SymbolResolver, name: &str) -> Result<ForeignHandle, RuntimeError> {
    call_n(resolver, name, &[])
}

pub fn call1(
    resolver: &mut SymbolResolver,
    name: &str,
    a: &ForeignHandle,
) -> Result<ForeignHandle, RuntimeError> {
    call_n(resolver, name, &[a])
}

pub fn call2(
    resolver: &mut SymbolResolver,
    name: &str,
    a: &ForeignHandle,
    b: &ForeignHandle,
) -> Result<ForeignHandle, RuntimeError> {
    call_n(resolver, name, &[a, b])
}

pub fn call3(
    resolver: &mut SymbolResolver,
    name: &str,
    a: &ForeignHandle,
    b: &ForeignHandle,
    c: &ForeignHandle,
) -> Result<ForeignHandle, RuntimeError> {
    call_n(resolver, name, &[a, b, c])
}

pub fn call4(
    resolver: &mut SymbolResolver,
    name: &str,
    a: &ForeignHandle,
    b: &ForeignHandle,
    c: &ForeignHandle,
    d: &ForeignHandle,
) -> Result<ForeignHandle, RuntimeError> {
    call_n(resolver, name, &[a, b, c, d])
}

pub fn call5(
    resolver: &mut SymbolResolver,
    name: &str,
    a: &ForeignHandle,
    b: &ForeignHandle,
    c: &ForeignHandle,
    d: &ForeignHandle,
    e: &ForeignHandle,
) -> Result<ForeignHandle, RuntimeError> {
    call_n(resolver, name, &[a, b, c, d, e])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{self, stoi, ForeignError};

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

    fn int(n: i64) -> ForeignHandle {
        ForeignHandle::wrap(stoi(n)).unwrap()
    }

    #[test]
    fn test_call2_multiplies() {
        let _arena = Scoped::open();
        let mut resolver = SymbolResolver::new();
        let product = call2(&mut resolver, "gmul", &int(12), &int(34)).unwrap();
        assert_eq!(product.to_host().unwrap(), Value::integer(408));
    }

    #[test]
    fn test_bound_function_checks_argument_count() {
        let _arena = Scoped::open();
        let mut resolver = SymbolResolver::new();
        let gadd = bind(&mut resolver, "gadd", 2).unwrap();
        let a = int(1);

        let error = gadd.call(&[&a]).unwrap_err();
        assert!(error.is_contract_violation());
        assert_eq!(
            error,
            RuntimeError::Call(CallError::ArityMismatch {
                name: "gadd".to_string(),
                expected: 2,
                got: 1,
            })
        );
        assert!(gadd.call(&[&a, &a, &a]).is_err());
        assert_eq!(gadd.call(&[&a, &a]).unwrap().to_host().unwrap(), Value::integer(2));
    }

    #[test]
    fn test_bind_rejects_unsupported_arity() {
        let mut resolver = SymbolResolver::new();
        assert_eq!(
            bind(&mut resolver, "gadd", 6).unwrap_err(),
            RuntimeError::Call(CallError::UnsupportedArity(6.into()))
        );
    }

    #[test]
    fn test_foreign_error_surfaces_through_call() {
        let _arena = Scoped::open();
        let mut resolver = SymbolResolver::new();
        let used_before = arena::stats().unwrap().used;
        let (one, zero) = (int(1), int(0));
        let used_after_args = arena::stats().unwrap().used;
        assert!(used_after_args > used_before);

        let error = call2(&mut resolver, "gdiv", &one, &zero).unwrap_err();
        assert!(matches!(
            error,
            RuntimeError::Foreign(ForeignError {
                kind: ForeignErrorKind::Inverse,
                ..
            })
        ));
        // the barrier rewound whatever gdiv allocated
        assert_eq!(arena::stats().unwrap().used, used_after_args);
    }

    #[test]
    fn test_call_values_converts_arguments() {
        let _arena = Scoped::open();
        let mut resolver = SymbolResolver::new();
        let mkvec2 = bind(&mut resolver, "mkvec2", 2).unwrap();
        let result = mkvec2
            .call_values(&[Value::integer(1), Value::integer(2)])
            .unwrap();
        assert_eq!(
            result.to_host().unwrap(),
            Value::sequence(vec![Value::integer(1), Value::integer(2)])
        );
    }
}

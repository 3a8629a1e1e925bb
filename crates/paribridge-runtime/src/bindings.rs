//! Host-facing entry points
//!
//! The fixed set of named functions the host runtime calls. Each takes host
//! values and returns one host value; every argument is checked before any
//! foreign code runs.

use crate::arena::{self, barrier, library, ArenaOptions, LimbOrder};
use crate::ffi::caller::{self, CallError, ForeignFunction};
use crate::ffi::handle::ForeignHandle;
use crate::ffi::loader::SymbolResolver;
use crate::ffi::marshal::{self, MarshalError};
use crate::ffi::types::Arity;
use crate::value::{RuntimeError, Value};
use num_traits::ToPrimitive;
use tracing::debug;

/// Signature of a host entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFunction {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub summary: &'static str,
}

const fn host(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    summary: &'static str,
) -> HostFunction {
    HostFunction {
        name,
        min_args,
        max_args,
        summary,
    }
}

/// Every host entry point
pub const HOST_FUNCTIONS: &[HostFunction] = &[
    host("arena_init", 2, 2, "initialise the arena: size, max_size"),
    host("arena_close", 0, 0, "release the arena"),
    host("arena_reset", 0, 0, "reclaim every cell of the arena"),
    host("arena_stats", 0, 0, "[used, committed, max, live_handles]"),
    host("foreign_version", 0, 0, "version of the foreign library"),
    host("roundtrip", 1, 1, "convert to the foreign side and back"),
    host("multiply", 2, 2, "product of two integers"),
    host("vecint", 1, 1, "integer list through a foreign vector"),
    host("unipoly", 1, 1, "handle to a polynomial from coefficients"),
    host("to_handle", 1, 1, "handle to a converted value"),
    host("int_to_handle", 1, 1, "handle to a converted integer"),
    host("handle_type", 1, 1, "foreign type code of a handle"),
    host("handle_data", 1, 1, "decode the value behind a handle"),
    host("handle_describe", 1, 1, "foreign rendering of a handle"),
    host("call0", 1, 1, "call a foreign function: name"),
    host("call1", 2, 2, "call a foreign function: name, h1"),
    host("call2", 3, 3, "call a foreign function: name, h1, h2"),
    host("call3", 4, 4, "call a foreign function: name, h1..h3"),
    host("call4", 5, 5, "call a foreign function: name, h1..h4"),
    host("call5", 6, 6, "call a foreign function: name, h1..h5"),
    host("bind", 2, 2, "resolve a foreign function: name, arity"),
    host("invoke", 1, 6, "call a bound function: f, h1..h5"),
];

/// Look up a host entry point by name
pub fn lookup(name: &str) -> Option<&'static HostFunction> {
    HOST_FUNCTIONS.iter().find(|f| f.name == name)
}

/// Check if a function name is a host entry point
pub fn is_host_function(name: &str) -> bool {
    lookup(name).is_some()
}

fn check_arg_count(function: &HostFunction, got: usize) -> Result<(), RuntimeError> {
    if (function.min_args..=function.max_args).contains(&got) {
        return Ok(());
    }
    let expected = if function.min_args == function.max_args {
        function.min_args.to_string()
    } else {
        format!("{} to {}", function.min_args, function.max_args)
    };
    Err(RuntimeError::WrongArgumentCount {
        name: function.name.to_string(),
        expected,
        got,
    })
}

fn expect_handle<'a>(value: &'a Value, function: &str) -> Result<&'a ForeignHandle, RuntimeError> {
    match value {
        Value::Handle(handle) => Ok(handle),
        other => Err(RuntimeError::NotAHandle {
            type_name: format!("{} (argument of {})", other.type_name(), function),
        }),
    }
}

fn expect_name(value: &Value, function: &str) -> Result<String, RuntimeError> {
    match value {
        Value::Text(bytes) => String::from_utf8(bytes.to_vec()).map_err(|_| {
            RuntimeError::InvalidArgument {
                msg: format!("{}: function name is not valid UTF-8", function),
            }
        }),
        other => Err(RuntimeError::InvalidArgument {
            msg: format!("{}: expected a function name, got {}", function, other.type_name()),
        }),
    }
}

fn expect_count(value: &Value, function: &str, what: &str) -> Result<u64, RuntimeError> {
    value
        .as_integer()
        .and_then(|n| n.to_u64())
        .ok_or_else(|| RuntimeError::InvalidArgument {
            msg: format!(
                "{}: {} must be a non-negative integer, got {}",
                function, what, value
            ),
        })
}

/// Dispatcher for the host entry points
///
/// Owns the symbol resolver used by the `call*` and `bind` entries.
pub struct HostFunctions {
    resolver: SymbolResolver,
    limb_order: LimbOrder,
}

impl HostFunctions {
    pub fn new(resolver: SymbolResolver) -> Self {
        Self {
            resolver,
            limb_order: LimbOrder::default(),
        }
    }

    /// Limb order used by `arena_init`
    pub fn with_limb_order(mut self, limb_order: LimbOrder) -> Self {
        self.limb_order = limb_order;
        self
    }

    pub fn resolver(&mut self) -> &mut SymbolResolver {
        &mut self.resolver
    }

    /// Call a host entry point by name
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let function = lookup(name).ok_or_else(|| RuntimeError::UnknownFunction {
            name: name.to_string(),
        })?;
        check_arg_count(function, args.len())?;
        debug!(name, args = args.len(), "host call");

        match name {
            "arena_init" => {
                let size = expect_count(&args[0], name, "size")?;
                let max_size = expect_count(&args[1], name, "max_size")?;
                let options = ArenaOptions::new(size, max_size).with_limb_order(self.limb_order);
                Ok(Value::text(arena::initialize_with(options)?))
            }
            "arena_close" => {
                arena::close()?;
                Ok(Value::Null)
            }
            "arena_reset" => {
                arena::reset()?;
                Ok(Value::Null)
            }
            "arena_stats" => {
                let stats = arena::stats()?;
                Ok(Value::sequence(vec![
                    Value::integer(stats.used),
                    Value::integer(stats.committed),
                    Value::integer(stats.max),
                    Value::integer(stats.live_handles as u64),
                ]))
            }
            "foreign_version" => {
                if !arena::is_initialized() {
                    return Err(arena::ArenaError::NotInitialized.into());
                }
                Ok(Value::text(library::version_string()))
            }
            "roundtrip" => marshal::roundtrip(&args[0]),
            "multiply" => self.multiply(&args[0], &args[1]),
            "vecint" => vecint(&args[0]),
            "unipoly" => Ok(marshal::unipoly(&args[0])?.into()),
            "to_handle" => Ok(marshal::to_handle(&args[0])?.into()),
            "int_to_handle" => Ok(marshal::int_to_handle(&args[0])?.into()),
            "handle_type" => {
                let handle = expect_handle(&args[0], name)?;
                Ok(Value::integer(handle.foreign_type()?))
            }
            "handle_data" => expect_handle(&args[0], name)?.to_host(),
            "handle_describe" => Ok(Value::text(expect_handle(&args[0], name)?.describe()?)),
            "call0" | "call1" | "call2" | "call3" | "call4" | "call5" => {
                let foreign = expect_name(&args[0], name)?;
                let handles = args[1..]
                    .iter()
                    .map(|arg| expect_handle(arg, name))
                    .collect::<Result<Vec<_>, _>>()?;
                let r = &mut self.resolver;
                let result = match handles.as_slice() {
                    [] => caller::call0(r, &foreign),
                    [a] => caller::call1(r, &foreign, a),
                    [a, b] => caller::call2(r, &foreign, a, b),
                    [a, b, c] => caller::call3(r, &foreign, a, b, c),
                    [a, b, c, d] => caller::call4(r, &foreign, a, b, c, d),
                    [a, b, c, d, e] => caller::call5(r, &foreign, a, b, c, d, e),
                    more => Err(CallError::UnsupportedArity(more.len().into()).into()),
                };
                Ok(result?.into())
            }
            "bind" => {
                let foreign = expect_name(&args[0], name)?;
                let arity = args[1]
                    .as_integer()
                    .ok_or_else(|| RuntimeError::InvalidArgument {
                        msg: format!("{}: arity must be an integer, got {}", name, args[1]),
                    })?;
                let arity = Arity::try_from(arity).map_err(RuntimeError::Call)?;
                let function = caller::bind(&mut self.resolver, &foreign, arity.count())?;
                Ok(Value::Function(function))
            }
            "invoke" => {
                let function = expect_function(&args[0], name)?;
                let handles = args[1..]
                    .iter()
                    .map(|arg| expect_handle(arg, name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(function.call(&handles)?.into())
            }
            _ => Err(RuntimeError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    fn multiply(&mut self, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
        for value in [a, b] {
            if !matches!(value, Value::Integer(_)) {
                return Err(MarshalError::NotConvertible {
                    type_name: value.type_name().to_string(),
                }
                .into());
            }
        }
        let resolver = &mut self.resolver;
        barrier::scratch(|| {
            let a = marshal::to_handle(a)?;
            let b = marshal::to_handle(b)?;
            caller::call2(resolver, "gmul", &a, &b)?.to_host()
        })
    }
}

impl Default for HostFunctions {
    fn default() -> Self {
        Self::new(SymbolResolver::new())
    }
}

fn expect_function<'a>(value: &'a Value, function: &str) -> Result<&'a ForeignFunction, RuntimeError> {
    match value {
        Value::Function(f) => Ok(f),
        other => Err(RuntimeError::InvalidArgument {
            msg: format!("{}: expected a bound function, got {}", function, other.type_name()),
        }),
    }
}

fn vecint(list: &Value) -> Result<Value, RuntimeError> {
    let elements = match list {
        Value::Sequence(elements) => elements,
        other => {
            return Err(MarshalError::NotConvertible {
                type_name: other.type_name().to_string(),
            }
            .into())
        }
    };
    if let Some(bad) = elements.iter().find(|v| !matches!(v, Value::Integer(_))) {
        return Err(MarshalError::NotConvertible {
            type_name: bad.type_name().to_string(),
        }
        .into());
    }
    marshal::roundtrip(list)
}

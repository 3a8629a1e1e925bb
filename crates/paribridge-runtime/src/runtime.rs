//! Bridge sessions
//!
//! A [`Bridge`] owns this thread's arena for its lifetime together with the
//! host entry points and symbol resolver. Dropping it closes the arena.

use crate::arena::{self, ArenaOptions, ArenaStats, LimbOrder};
use crate::bindings::HostFunctions;
use crate::ffi::caller::{self, ForeignFunction};
use crate::ffi::loader::SymbolResolver;
use crate::value::{RuntimeError, Value};
use paribridge_config::Config;
use tracing::{debug, info};

/// An open bridge to the foreign library on the current thread
pub struct Bridge {
    host: HostFunctions,
    generation: u64,
    version: String,
}

impl Bridge {
    /// Initialise the arena and resolve symbols from the built-in exports and
    /// the running process
    pub fn open(options: ArenaOptions) -> Result<Self, RuntimeError> {
        Self::with_resolver(options, SymbolResolver::new())
    }

    /// Open with a prepared resolver
    pub fn with_resolver(
        options: ArenaOptions,
        resolver: SymbolResolver,
    ) -> Result<Self, RuntimeError> {
        let limb_order = options.limb_order;
        let version = arena::initialize_with(options)?;
        let generation = arena::generation().ok_or(arena::ArenaError::NotInitialized)?;
        Ok(Self {
            host: HostFunctions::new(resolver).with_limb_order(limb_order),
            generation,
            version,
        })
    }

    /// Open from merged configuration
    ///
    /// Configured libraries are loaded before the arena is created, so a
    /// missing library leaves no arena behind.
    pub fn from_config(config: &Config) -> Result<Self, RuntimeError> {
        let mut resolver = SymbolResolver::new();
        resolver.set_process_lookup(config.process_lookup());
        for library in config.libraries() {
            resolver.load_library(&library.to_string_lossy())?;
        }
        let options = ArenaOptions::new(config.arena_initial_size(), config.arena_max_size())
            .with_limb_order(limb_order_from(config.limb_order()));
        info!(libraries = resolver.loaded_count(), "opening bridge from configuration");
        Self::with_resolver(options, resolver)
    }

    /// Version string reported when the arena was initialised
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resolver(&mut self) -> &mut SymbolResolver {
        self.host.resolver()
    }

    /// Call a host entry point by name
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        self.host.call(name, args)
    }

    /// Call a foreign function with host values and decode its result
    ///
    /// The function is resolved with the arity given by `args.len()`.
    pub fn call_foreign(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let function = self.bind(name, args.len())?;
        function.call_values(args)?.to_host()
    }

    /// Resolve a foreign function for repeated calls
    pub fn bind(&mut self, name: &str, arity: usize) -> Result<ForeignFunction, RuntimeError> {
        caller::bind(self.host.resolver(), name, arity)
    }

    pub fn stats(&self) -> Result<ArenaStats, RuntimeError> {
        Ok(arena::stats()?)
    }

    /// Close the arena now, reporting any error
    pub fn close(mut self) -> Result<(), RuntimeError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), RuntimeError> {
        // The arena may have been closed and reopened through the host entry
        // points; only the generation this bridge opened is ours to close.
        if arena::generation() == Some(self.generation) {
            arena::close()?;
        } else {
            debug!(generation = self.generation, "bridge arena already released");
        }
        Ok(())
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn limb_order_from(order: paribridge_config::LimbOrder) -> LimbOrder {
    match order {
        paribridge_config::LimbOrder::Lsw => LimbOrder::LeastSignificantFirst,
        paribridge_config::LimbOrder::Msw => LimbOrder::MostSignificantFirst,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::CallError;
    use paribridge_config::{ArenaSettings, ByteSize, ConfigFile};
    use pretty_assertions::assert_eq;

    fn small() -> ArenaOptions {
        ArenaOptions::new(1 << 16, 1 << 20)
    }

    #[test]
    fn test_open_and_drop() {
        {
            let bridge = Bridge::open(small()).unwrap();
            assert!(bridge.version().starts_with("paribridge arena "));
            assert_eq!(arena::generation(), Some(bridge.generation()));
        }
        assert!(!arena::is_initialized());
    }

    #[test]
    fn test_second_bridge_on_same_thread_fails() {
        let _bridge = Bridge::open(small()).unwrap();
        assert_eq!(
            Bridge::open(small()).err(),
            Some(RuntimeError::Arena(arena::ArenaError::AlreadyInitialized))
        );
    }

    #[test]
    fn test_call_foreign() {
        let mut bridge = Bridge::open(small()).unwrap();
        let product = bridge
            .call_foreign("gmul", &[Value::integer(12), Value::integer(34)])
            .unwrap();
        assert_eq!(product, Value::integer(408));
        assert_eq!(
            bridge.call_foreign("no_such_fn", &[]).unwrap_err(),
            RuntimeError::Call(CallError::FunctionNotFound {
                name: "no_such_fn".to_string()
            })
        );
    }

    #[test]
    fn test_drop_leaves_reopened_arena_alone() {
        let mut bridge = Bridge::open(small()).unwrap();
        bridge.call("arena_close", &[]).unwrap();
        bridge
            .call("arena_init", &[Value::integer(1 << 16), Value::integer(1 << 20)])
            .unwrap();
        let reopened = arena::generation().unwrap();
        assert_ne!(reopened, bridge.generation());

        drop(bridge);
        assert_eq!(arena::generation(), Some(reopened));
        arena::close().unwrap();
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            file: ConfigFile {
                arena: Some(ArenaSettings {
                    initial_size: Some(ByteSize::new(1 << 16)),
                    max_size: Some(ByteSize::new(1 << 18)),
                    limb_order: Some(paribridge_config::LimbOrder::Msw),
                }),
                ..Default::default()
            },
            project_root: None,
        };
        let bridge = Bridge::from_config(&config).unwrap();
        let stats = bridge.stats().unwrap();
        assert_eq!(stats.committed, 1 << 16);
        assert_eq!(stats.max, 1 << 18);
        assert_eq!(stats.limb_order, LimbOrder::MostSignificantFirst);
        bridge.close().unwrap();
        assert!(!arena::is_initialized());
    }
}
